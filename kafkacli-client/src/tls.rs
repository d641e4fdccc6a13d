//! TLS file validation
//!
//! librdkafka loads the CA, certificate and key files itself, but only when
//! the first connection is attempted. The files are checked here up front so
//! a wrong path or a non-PEM file is reported before any network activity.

use crate::config::SecurityConfig;
use crate::error::ClientError;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Validate the TLS material referenced by the security configuration
pub fn validate(security: &SecurityConfig) -> Result<(), ClientError> {
    match (&security.cert_path, &security.key_path) {
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::tls(
                "You need to specify both ssl-certfile and ssl-keyfile",
            ));
        }
        (Some(cert), Some(key)) => {
            load_certs(cert)?;
            load_private_key(key)?;
        }
        (None, None) => {}
    }

    if let Some(ca) = &security.ca_path {
        load_certs(ca)?;
    }

    Ok(())
}

/// Count the certificates in a PEM file, failing when there are none
fn load_certs(path: &Path) -> Result<usize, ClientError> {
    let mut reader = open(path)?;

    let count = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::tls(format!("{}: {}", path.display(), e)))?
        .len();

    if count == 0 {
        return Err(ClientError::tls(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    debug!("Loaded {} certificates from {}", count, path.display());
    Ok(count)
}

fn load_private_key(path: &Path) -> Result<(), ClientError> {
    let mut reader = open(path)?;

    match private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ClientError::tls(format!(
            "No private key found in {}",
            path.display()
        ))),
        Err(e) => Err(ClientError::tls(format!("{}: {}", path.display(), e))),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ClientError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ClientError::tls(format!("Failed to read {}: {}", path.display(), e)))
}
