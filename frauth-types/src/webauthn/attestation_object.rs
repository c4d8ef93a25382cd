//! Binary codec for the attestation object and the authenticator data it carries.
//!
//! <https://w3c.github.io/webauthn/#sctn-attestation>

use std::io::Cursor;

use ciborium::value::Value;

use crate::{crypto::sha256, Bytes};

/// Errors produced while decoding or encoding attestation structures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    /// The byte string ended before a mandatory field.
    #[error("authenticator data is truncated")]
    Truncated,
    /// The CBOR could not be read or written.
    #[error("invalid CBOR: {0}")]
    Cbor(String),
    /// A mandatory attestation object entry is missing or has the wrong type.
    #[error("attestation object entry `{0}` is missing or malformed")]
    MissingField(&'static str),
}

bitflags::bitflags! {
    /// Flags carried in the authenticator data.
    ///
    /// <https://w3c.github.io/webauthn/#authdata-flags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// User Present
        const UP = 1 << 0;
        /// User Verified
        const UV = 1 << 2;
        /// Backup Eligibility
        const BE = 1 << 3;
        /// Backup State
        const BS = 1 << 4;
        /// Attested credential data included
        const AT = 1 << 6;
        /// Extension data included
        const ED = 1 << 7;
    }
}

/// An Authenticator Attestation GUID, identifying the make and model of an authenticator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Aaguid(pub [u8; Self::LEN]);

impl Aaguid {
    const LEN: usize = 16;

    /// The all-zero AAGUID used for self and none attestation.
    pub const fn new_empty() -> Self {
        Self([0; Self::LEN])
    }

    /// Whether this AAGUID identifies nothing.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// The credential record attested during creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    credential_id: Vec<u8>,

    /// The credential public key as a COSE_Key CBOR value.
    pub key: Value,
}

impl AttestedCredentialData {
    /// Build attested credential data from its parts.
    pub fn new(aaguid: Aaguid, credential_id: Vec<u8>, key: Value) -> Self {
        Self {
            aaguid,
            credential_id,
            key,
        }
    }

    /// The credential id.
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    fn from_reader(reader: &mut Cursor<&[u8]>) -> Result<Self, AttestationError> {
        let aaguid: [u8; Aaguid::LEN] = take(reader, Aaguid::LEN)?
            .try_into()
            .map_err(|_| AttestationError::Truncated)?;
        let id_len: [u8; 2] = take(reader, 2)?
            .try_into()
            .map_err(|_| AttestationError::Truncated)?;
        let credential_id = take(reader, usize::from(u16::from_be_bytes(id_len)))?.to_vec();
        let key: Value = ciborium::de::from_reader(&mut *reader)
            .map_err(|e| AttestationError::Cbor(e.to_string()))?;

        Ok(Self {
            aaguid: Aaguid(aaguid),
            credential_id,
            key,
        })
    }

    fn write_into(&self, out: &mut Vec<u8>) -> Result<(), AttestationError> {
        let id_len =
            u16::try_from(self.credential_id.len()).map_err(|_| AttestationError::Truncated)?;
        out.extend_from_slice(&self.aaguid.0);
        out.extend_from_slice(&id_len.to_be_bytes());
        out.extend_from_slice(&self.credential_id);
        ciborium::ser::into_writer(&self.key, &mut *out)
            .map_err(|e| AttestationError::Cbor(e.to_string()))
    }
}

/// Read exactly `len` bytes from the cursor.
fn take<'a>(reader: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], AttestationError> {
    let data: &'a [u8] = reader.get_ref();
    let start = usize::try_from(reader.position()).map_err(|_| AttestationError::Truncated)?;
    let end = start.checked_add(len).ok_or(AttestationError::Truncated)?;
    let slice = data.get(start..end).ok_or(AttestationError::Truncated)?;
    reader.set_position(u64::try_from(end).map_err(|_| AttestationError::Truncated)?);
    Ok(slice)
}

/// The authenticator data structure encodes contextual bindings made by the authenticator.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    rp_id_hash: [u8; 32],

    /// See [Flags].
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer.
    pub counter: u32,

    /// Present when [`Flags::AT`] is set.
    pub attested_credential_data: Option<AttestedCredentialData>,

    /// Extension outputs as a CBOR map, present when [`Flags::ED`] is set.
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Create a new authenticator data for an RP ID with no flags set.
    pub fn new(rp_id: &str, counter: u32) -> Self {
        Self {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: Flags::empty(),
            counter,
            attested_credential_data: None,
            extensions: None,
        }
    }

    /// Add an [`AttestedCredentialData`], setting [`Flags::AT`].
    pub fn set_attested_credential_data(mut self, acd: AttestedCredentialData) -> Self {
        self.attested_credential_data = Some(acd);
        self.flags |= Flags::AT;
        self
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.rp_id_hash
    }

    /// Decode authenticator data from its byte representation.
    pub fn from_slice(v: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = Cursor::new(v);
        let rp_id_hash: [u8; 32] = take(&mut reader, 32)?
            .try_into()
            .map_err(|_| AttestationError::Truncated)?;
        let flags = Flags::from_bits_retain(take(&mut reader, 1)?[0]);
        let counter: [u8; 4] = take(&mut reader, 4)?
            .try_into()
            .map_err(|_| AttestationError::Truncated)?;

        let attested_credential_data = flags
            .contains(Flags::AT)
            .then(|| AttestedCredentialData::from_reader(&mut reader))
            .transpose()?;
        let extensions = flags
            .contains(Flags::ED)
            .then(|| {
                ciborium::de::from_reader(&mut reader)
                    .map_err(|e| AttestationError::Cbor(e.to_string()))
            })
            .transpose()?;

        Ok(Self {
            rp_id_hash,
            flags,
            counter: u32::from_be_bytes(counter),
            attested_credential_data,
            extensions,
        })
    }

    /// Encode the authenticator data to its byte representation.
    pub fn to_vec(&self) -> Result<Vec<u8>, AttestationError> {
        let mut flags = self.flags;
        flags.set(Flags::AT, self.attested_credential_data.is_some());
        flags.set(Flags::ED, self.extensions.is_some());

        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(flags.bits());
        out.extend_from_slice(&self.counter.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            acd.write_into(&mut out)?;
        }
        if let Some(extensions) = &self.extensions {
            ciborium::ser::into_writer(extensions, &mut out)
                .map_err(|e| AttestationError::Cbor(e.to_string()))?;
        }
        Ok(out)
    }
}

/// The attestation object produced by a credential creation.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    /// The attestation statement format identifier, e.g. `packed` or `none`.
    pub fmt: String,

    /// The format specific attestation statement, a CBOR map.
    pub att_stmt: Value,

    /// The authenticator data.
    pub auth_data: AuthenticatorData,
}

impl AttestationObject {
    /// Decode a CBOR attestation object.
    pub fn from_slice(v: &[u8]) -> Result<Self, AttestationError> {
        let value: Value =
            ciborium::de::from_reader(v).map_err(|e| AttestationError::Cbor(e.to_string()))?;
        let entries = value
            .into_map()
            .map_err(|_| AttestationError::MissingField("map"))?;

        let (mut fmt, mut att_stmt, mut auth_data) = (None, None, None);
        for (key, value) in entries {
            match key.as_text() {
                Some("fmt") => fmt = value.into_text().ok(),
                Some("attStmt") => att_stmt = Some(value),
                Some("authData") => auth_data = value.into_bytes().ok(),
                _ => log::debug!("ignoring unknown attestation object entry"),
            }
        }

        Ok(Self {
            fmt: fmt.ok_or(AttestationError::MissingField("fmt"))?,
            att_stmt: att_stmt.ok_or(AttestationError::MissingField("attStmt"))?,
            auth_data: AuthenticatorData::from_slice(
                &auth_data.ok_or(AttestationError::MissingField("authData"))?,
            )?,
        })
    }

    /// Encode the attestation object to CBOR.
    pub fn to_bytes(&self) -> Result<Bytes, AttestationError> {
        let value = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(self.fmt.clone())),
            (Value::Text("attStmt".into()), self.att_stmt.clone()),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.auth_data.to_vec()?),
            ),
        ]);
        let mut out = Vec::with_capacity(256);
        ciborium::ser::into_writer(&value, &mut out)
            .map_err(|e| AttestationError::Cbor(e.to_string()))?;
        Ok(out.into())
    }

    /// A `packed` attestation without a certificate chain whose authenticator does not identify
    /// itself through its AAGUID.
    pub fn is_self_attestation(&self) -> bool {
        if self.fmt != "packed" {
            return false;
        }
        let has_stmt_entry = |name: &str| {
            self.att_stmt
                .as_map()
                .map(|entries| entries.iter().any(|(k, _)| k.as_text() == Some(name)))
                .unwrap_or(false)
        };
        if has_stmt_entry("x5c") || has_stmt_entry("ecdaaKeyId") {
            return false;
        }
        self.auth_data
            .attested_credential_data
            .as_ref()
            .map(|acd| acd.aaguid.is_empty())
            .unwrap_or(false)
    }

    /// Strip identifying information: `none` format, empty statement and a zeroed AAGUID.
    pub fn to_none(&self) -> Self {
        let mut auth_data = self.auth_data.clone();
        if let Some(acd) = auth_data.attested_credential_data.as_mut() {
            acd.aaguid = Aaguid::new_empty();
        }
        Self {
            fmt: "none".into(),
            att_stmt: Value::Map(Vec::new()),
            auth_data,
        }
    }
}
