#![allow(dead_code)]

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::traits::PublicKeyParts;
use sha2::{Digest, Sha256, Sha512};
use ssh_encoding::Encode;
use ssh_key::Mpint;
use tempfile::TempDir;

use ssh_agent_signer::agent::protocol::{AgentRequest, AgentResponse, read_frame, write_frame};
use ssh_agent_signer::{AgentKey, AgentSignature, SignFlags};

const RSA_TEST_KEY_BITS: usize = 1024;

/// A private key the fake agent holds.
#[derive(Clone)]
pub enum TestKey {
    Rsa(rsa::RsaPrivateKey),
    P256(p256::ecdsa::SigningKey),
}

impl TestKey {
    /// Deterministic RSA key: the SHA-256 of the seed seeds a ChaCha20 CSPRNG.
    pub fn rsa_from_seed(seed: &str) -> Self {
        let hash = Sha256::digest(seed.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(hash.into());
        Self::Rsa(rsa::RsaPrivateKey::new(&mut rng, RSA_TEST_KEY_BITS).unwrap())
    }

    pub fn p256_from_seed(seed: &str) -> Self {
        let hash = Sha256::digest(seed.as_bytes());
        Self::P256(p256::ecdsa::SigningKey::from_bytes(&hash).unwrap())
    }

    pub fn public_blob(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        match self {
            Self::Rsa(key) => {
                b"ssh-rsa".as_slice().encode(&mut blob).unwrap();
                mpint(&key.e().to_bytes_be()).encode(&mut blob).unwrap();
                mpint(&key.n().to_bytes_be()).encode(&mut blob).unwrap();
            }
            Self::P256(key) => {
                b"ecdsa-sha2-nistp256".as_slice().encode(&mut blob).unwrap();
                b"nistp256".as_slice().encode(&mut blob).unwrap();
                key.verifying_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .encode(&mut blob)
                    .unwrap();
            }
        }
        blob
    }

    pub fn comment(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "rsa@test",
            Self::P256(_) => "p256@test",
        }
    }

    /// Signs like ssh-agent: RSA honours the SHA-2 flags and refuses SHA-1.
    fn sign(&self, data: &[u8], flags: SignFlags) -> Option<AgentSignature> {
        match self {
            Self::Rsa(key) if flags.contains(SignFlags::RSA_SHA2_512) => Some(AgentSignature {
                format: "rsa-sha2-512".into(),
                blob: rsa::pkcs1v15::SigningKey::<Sha512>::new(key.clone()).sign(data).to_vec(),
            }),
            Self::Rsa(key) if flags.contains(SignFlags::RSA_SHA2_256) => Some(AgentSignature {
                format: "rsa-sha2-256".into(),
                blob: rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone()).sign(data).to_vec(),
            }),
            Self::Rsa(_) => None,
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(data);
                let (r, s) = signature.split_bytes();
                let mut blob = Vec::new();
                mpint(&r).encode(&mut blob).unwrap();
                mpint(&s).encode(&mut blob).unwrap();
                Some(AgentSignature {
                    format: "ecdsa-sha2-nistp256".into(),
                    blob,
                })
            }
        }
    }

    /// Checks a base64 signature text produced by the signer.
    pub fn verify(&self, data: &[u8], text: &str) -> bool {
        let Ok(bytes) = STANDARD.decode(text) else {
            return false;
        };
        match self {
            Self::Rsa(key) => {
                use rsa::signature::Verifier as _;
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.to_public_key());
                rsa::pkcs1v15::Signature::try_from(bytes.as_slice())
                    .is_ok_and(|signature| verifying_key.verify(data, &signature).is_ok())
            }
            Self::P256(key) => p256::ecdsa::Signature::from_der(&bytes)
                .is_ok_and(|signature| key.verifying_key().verify(data, &signature).is_ok()),
        }
    }
}

fn mpint(magnitude: &[u8]) -> Mpint {
    Mpint::from_positive_bytes(magnitude).unwrap()
}

/// Shared 1024-bit RSA key; generation is slow in debug builds.
pub fn rsa_key() -> TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::rsa_from_seed("agent-signer-test")).clone()
}

/// How the fake agent treats sign requests.
#[derive(Clone, Default)]
struct Behavior {
    refuse_signing: bool,
    /// Payload whose signature is only sent after the delay.
    slow_payload: Option<(Vec<u8>, Duration)>,
}

/// SSH agent speaking the real protocol on a Unix socket in a temp dir.
pub struct FakeAgent {
    _dir: TempDir,
    socket: PathBuf,
    connections: Arc<AtomicUsize>,
    sign_requests: Arc<AtomicUsize>,
}

impl FakeAgent {
    pub fn spawn(keys: Vec<TestKey>) -> Self {
        Self::start(keys, Behavior::default())
    }

    /// Lists keys but answers every sign request with a failure.
    pub fn refusing(keys: Vec<TestKey>) -> Self {
        Self::start(
            keys,
            Behavior {
                refuse_signing: true,
                ..Behavior::default()
            },
        )
    }

    /// Answers a request to sign `payload` only after `delay`.
    pub fn slow_for(keys: Vec<TestKey>, payload: &str, delay: Duration) -> Self {
        Self::start(
            keys,
            Behavior {
                slow_payload: Some((payload.as_bytes().to_vec(), delay)),
                ..Behavior::default()
            },
        )
    }

    fn start(keys: Vec<TestKey>, behavior: Behavior) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("agent.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let keys = Arc::new(keys);
        let connections = Arc::new(AtomicUsize::new(0));
        let sign_requests = Arc::new(AtomicUsize::new(0));

        let accepted = Arc::clone(&connections);
        let signed = Arc::clone(&sign_requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accepted.fetch_add(1, Ordering::SeqCst);
                let keys = Arc::clone(&keys);
                let signed = Arc::clone(&signed);
                let behavior = behavior.clone();
                thread::spawn(move || serve(stream, &keys, &behavior, &signed));
            }
        });

        Self {
            _dir: dir,
            socket,
            connections,
            sign_requests,
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Sign requests received so far, across all connections.
    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

fn serve(mut stream: UnixStream, keys: &[TestKey], behavior: &Behavior, signed: &AtomicUsize) {
    while let Ok(frame) = read_frame(&mut stream) {
        let response = match AgentRequest::decode(&frame) {
            Ok(AgentRequest::RequestIdentities) => AgentResponse::IdentitiesAnswer(
                keys.iter()
                    .map(|key| AgentKey::new(key.public_blob(), key.comment().to_owned()))
                    .collect(),
            ),
            Ok(AgentRequest::SignRequest { key_blob, data, flags }) => {
                signed.fetch_add(1, Ordering::SeqCst);
                match &behavior.slow_payload {
                    Some((payload, delay)) if *payload == data => thread::sleep(*delay),
                    _ => {}
                }
                if behavior.refuse_signing {
                    AgentResponse::Failure
                } else {
                    keys.iter()
                        .find(|key| key.public_blob() == key_blob)
                        .and_then(|key| key.sign(&data, flags))
                        .map_or(AgentResponse::Failure, AgentResponse::SignResponse)
                }
            }
            Err(_) => AgentResponse::Failure,
        };
        let Ok(reply) = response.encode() else { break };
        if write_frame(&mut stream, &reply).is_err() {
            break;
        }
    }
}

/// Splits the `signature="..."` field off an authorization header value.
pub fn header_signature(header: &str) -> &str {
    let (_, rest) = header.rsplit_once("signature=\"").unwrap();
    rest.strip_suffix('"').unwrap()
}
