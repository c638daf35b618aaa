use std::path::Path;

use git2::{cert::Cert, CertificateCheckStatus, Config, Cred, CredentialType, RemoteCallbacks};
use log::trace;
use ssh_key::{known_hosts::HostPatterns, KnownHosts};

/// Callbacks authenticating against a remote with the ambient git setup.
pub(super) fn authenticated_callbacks<'a>(
    git_config: &'a Config,
    known_hosts: &'a Path,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed_types| {
        trace!(
            "Requested credentials for {}, username {:?}, allowed types {:?}",
            url,
            username,
            allowed_types
        );
        if allowed_types.contains(CredentialType::USERNAME) {
            return Cred::username("git");
        }
        if allowed_types.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::credential_helper(git_config, url, username);
        }
        Err(git2::Error::from_str("no valid authentication available"))
    });
    callbacks.certificate_check(move |certificate, host| {
        check_certificate(known_hosts, certificate, host)
    });
    callbacks
}

fn check_certificate(
    known_hosts: &Path,
    certificate: &Cert<'_>,
    host: &str,
) -> Result<CertificateCheckStatus, git2::Error> {
    if let Some(hostkey) = certificate.as_hostkey().and_then(|h| h.hostkey()) {
        trace!("Loading {}", known_hosts.display());
        match KnownHosts::read_file(known_hosts) {
            Ok(entries) => {
                let matched = entries
                    .iter()
                    .filter(|entry| host_matches_patterns(host, entry.host_patterns()))
                    .any(|entry| entry.public_key().to_bytes().as_deref() == Ok(hostkey));
                if matched {
                    trace!("Known host entry for {} matches the host key", host);
                    return Ok(CertificateCheckStatus::CertificateOk);
                }
                trace!("No known host entry matched the host key of {}", host);
            }
            Err(error) => trace!("Could not load {}: {}", known_hosts.display(), error),
        }
    }
    Ok(CertificateCheckStatus::CertificatePassthrough)
}

fn host_matches_patterns(host: &str, patterns: &HostPatterns) -> bool {
    match patterns {
        HostPatterns::Patterns(patterns) => {
            let mut matched = false;
            for pattern in patterns {
                let pattern = pattern.to_lowercase();
                // * and ? wildcards are not supported
                if let Some(negated) = pattern.strip_prefix('!') {
                    if negated == host {
                        return false;
                    }
                } else {
                    matched |= pattern == host;
                }
            }
            matched
        }
        HostPatterns::HashedName { .. } => false,
    }
}
