//! Certificate key pairs and signing requests

use rcgen::{CertificateParams, KeyPair};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{AcquisitionError, AcquisitionResult};

const RSA_BITS: usize = 2048;

/// Algorithm of the certificate's key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// RSA, 2048-bit modulus
    #[default]
    Rsa2048,
    /// ECDSA on NIST P-256
    EcdsaP256,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rsa2048 => "rsa2048",
            Self::EcdsaP256 => "ecdsa_p256",
        })
    }
}

/// Freshly generated certificate key
pub(crate) struct CertificateKey {
    pair: KeyPair,
    pem: SecretString,
}

impl CertificateKey {
    pub(crate) fn generate(algorithm: KeyAlgorithm) -> AcquisitionResult<Self> {
        match algorithm {
            KeyAlgorithm::Rsa2048 => {
                let key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
                    .map_err(|e| AcquisitionError::KeyGeneration(e.to_string()))?;
                let pem = key
                    .to_pkcs8_pem(LineEnding::LF)
                    .map_err(|e| AcquisitionError::KeyGeneration(e.to_string()))?;
                let pair = KeyPair::from_pkcs8_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256)?;
                Ok(Self {
                    pair,
                    pem: SecretString::from(pem.as_str().to_owned()),
                })
            }
            KeyAlgorithm::EcdsaP256 => {
                let pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
                let pem = SecretString::from(pair.serialize_pem());
                Ok(Self { pair, pem })
            }
        }
    }

    /// DER-encoded CSR naming every domain as a SAN
    pub(crate) fn signing_request(&self, domains: &[String]) -> AcquisitionResult<Vec<u8>> {
        let csr = CertificateParams::new(domains.to_vec())?.serialize_request(&self.pair)?;
        Ok(csr.der().to_vec())
    }

    pub(crate) fn into_pem(self) -> SecretString {
        self.pem
    }
}
