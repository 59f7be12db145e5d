//! AWS Signature Version 4 for single JSON-protocol requests.
//!
//! Only what the forecast call needs: no query strings, no chunked payloads,
//! and the path is sent already normalized.

use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// `X-Amz-Date` header value
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
    region: &'a str,
    service: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credentials: &'a Credentials, region: &'a str, service: &'a str) -> Self {
        Self {
            credentials,
            region,
            service,
        }
    }

    /// Build the `Authorization` header value.
    ///
    /// `headers` must already contain `host` and `x-amz-date` (and
    /// `x-amz-security-token` for temporary credentials); every header passed
    /// here is signed.
    pub fn authorization(
        &self,
        time: DateTime<Utc>,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
    ) -> Result<String, InvalidLength> {
        let mut canonical: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
            .collect();
        canonical.sort();

        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();
        let signed_headers = canonical
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method,
            path,
            canonical_headers,
            signed_headers,
            hex::encode(Sha256::digest(payload)),
        );

        let date = time.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date(time),
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes())),
        );

        let key = self.signing_key(&date)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        ))
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, InvalidLength> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }
    }

    #[test]
    fn test_signing_key_derivation() {
        let creds = example_credentials();
        let signer = RequestSigner::new(&creds, "us-east-1", "iam");

        let key = signer.signing_key("20120215").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_get_vanilla_vector() {
        let creds = example_credentials();
        let signer = RequestSigner::new(&creds, "us-east-1", "service");
        let time = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let date = amz_date(time);

        let auth = signer
            .authorization(
                time,
                "GET",
                "/",
                &[("Host", "example.amazonaws.com"), ("X-Amz-Date", &date)],
                b"",
            )
            .unwrap();

        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_header_order_does_not_matter() {
        let creds = example_credentials();
        let signer = RequestSigner::new(&creds, "us-east-1", "ce");
        let time = Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        let date = amz_date(time);

        let a = signer
            .authorization(time, "POST", "/", &[("host", "ce.us-east-1.amazonaws.com"), ("x-amz-date", &date)], b"{}")
            .unwrap();
        let b = signer
            .authorization(time, "POST", "/", &[("X-Amz-Date", &date), ("Host", "ce.us-east-1.amazonaws.com")], b"{}")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut creds = example_credentials();
        creds.session_token = Some("token".to_string());
        let debug = format!("{:?}", creds);

        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("EXAMPLEKEY"));
        assert!(!debug.contains("token\""));
    }
}
