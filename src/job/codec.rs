//! Binary encoding for jobs and job outcomes
//!
//! Streamable jobs travel inside a [`JobEnvelope`]:
//!
//! ```text
//! ┌──────────┬─────────┬────────────┬──────────────────────┐
//! │ tag: u16 │ ver: u8 │ len: u32   │ body (len bytes)     │
//! └──────────┴─────────┴────────────┴──────────────────────┘
//! ```
//!
//! The body is whatever [`StreamableJob::write_to`] produced, read back in the
//! same order by [`StreamableJob::read_from`]. All integers are big-endian and
//! strings are a `u32` byte length followed by UTF-8.
//!
//! Decoding picks the concrete job type from the tag through a fixed table
//! ([`JobKind::decoder`]); there is no runtime type lookup.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::cluster::{NodeDirectoryCleanJob, NodeHandshakeJob};
use super::indexing::{CollectionAddIndexingJob, MasterCollectionAddIndexingJob};
use super::{Job, JobFailure, JobOutcome, JobValue, StreamableJob};

/// Current envelope layout version
pub const ENVELOPE_VERSION: u8 = 1;

const ENVELOPE_HEADER_LEN: usize = 2 + 1 + 4;

const OUTCOME_EMPTY: u8 = 0;
const OUTCOME_VALUE: u8 = 1;
const OUTCOME_FAILURE: u8 = 2;

const VALUE_BOOL: u8 = 0;
const VALUE_INT: u8 = 1;
const VALUE_TEXT: u8 = 2;
const VALUE_BYTES: u8 = 3;

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    #[error("unknown job tag {0}")]
    UnknownTag(u16),

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown value tag {0}")]
    UnknownValueTag(u8),

    #[error("unknown outcome status {0}")]
    UnknownStatus(u8),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("job '{0}' has no binary encoding")]
    NotStreamable(&'static str),

    #[error("field of {0} bytes exceeds the u32 length prefix")]
    TooLarge(usize),
}

/// Length prefix for a field of `len` bytes
fn field_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::TooLarge(len))
}

// ============================================================================
// Ordered field writer / reader
// ============================================================================

/// Ordered binary writer for job bodies
#[derive(Debug, Default)]
pub struct DataOutput {
    buf: BytesMut,
    oversized: Option<usize>,
}

impl DataOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write a length-prefixed byte field
    ///
    /// A field too long for its prefix is skipped and fails [`DataOutput::finish`].
    pub fn write_bytes(&mut self, value: &[u8]) {
        match field_len(value.len()) {
            Ok(len) => {
                self.buf.put_u32(len);
                self.buf.put_slice(value);
            }
            Err(_) => {
                self.oversized.get_or_insert(value.len());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Freeze the buffer, failing if any field overflowed its length prefix
    pub fn finish(self) -> Result<Bytes, CodecError> {
        match self.oversized {
            Some(len) => Err(CodecError::TooLarge(len)),
            None => Ok(self.buf.freeze()),
        }
    }
}

/// Ordered binary reader for job bodies
#[derive(Debug)]
pub struct DataInput {
    buf: Bytes,
}

impl DataInput {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_bytes(&mut self) -> Result<Bytes, CodecError> {
        let len = self.read_u32()? as usize;
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Fail if anything is left unread
    pub fn finish(self) -> Result<(), CodecError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

// ============================================================================
// Job tags
// ============================================================================

type Decoder = fn(&mut DataInput) -> Result<Arc<dyn Job>, CodecError>;

/// Wire tag of every job type that may cross the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum JobKind {
    NodeHandshake = 1,
    NodeDirectoryClean = 2,
    CollectionAddIndexing = 3,
    MasterCollectionAddIndexing = 4,
}

impl JobKind {
    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(tag: u16) -> Result<Self, CodecError> {
        match tag {
            1 => Ok(Self::NodeHandshake),
            2 => Ok(Self::NodeDirectoryClean),
            3 => Ok(Self::CollectionAddIndexing),
            4 => Ok(Self::MasterCollectionAddIndexing),
            other => Err(CodecError::UnknownTag(other)),
        }
    }

    /// Factory that rebuilds the concrete job for this tag
    pub fn decoder(self) -> Decoder {
        match self {
            Self::NodeHandshake => decode_as::<NodeHandshakeJob>,
            Self::NodeDirectoryClean => decode_as::<NodeDirectoryCleanJob>,
            Self::CollectionAddIndexing => decode_as::<CollectionAddIndexingJob>,
            Self::MasterCollectionAddIndexing => decode_as::<MasterCollectionAddIndexingJob>,
        }
    }
}

fn decode_as<J: StreamableJob + 'static>(input: &mut DataInput) -> Result<Arc<dyn Job>, CodecError> {
    Ok(Arc::new(J::read_from(input)?))
}

// ============================================================================
// Envelope
// ============================================================================

/// Tagged, versioned container for one streamable job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEnvelope {
    pub kind: JobKind,
    pub version: u8,
    pub body: Bytes,
}

impl JobEnvelope {
    /// Capture a job's body under the current version
    pub fn of(job: &dyn StreamableJob) -> Result<Self, CodecError> {
        let mut body = DataOutput::new();
        job.write_to(&mut body);
        Ok(Self {
            kind: job.kind(),
            version: ENVELOPE_VERSION,
            body: body.finish()?,
        })
    }

    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let len = field_len(self.body.len())?;
        let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER_LEN + self.body.len());
        buf.put_u16(self.kind.tag());
        buf.put_u8(self.version);
        buf.put_u32(len);
        buf.put_slice(&self.body);
        Ok(buf.freeze())
    }

    pub fn decode(bytes: Bytes) -> Result<Self, CodecError> {
        let mut input = DataInput::new(bytes);
        let kind = JobKind::from_tag(input.read_u16()?)?;
        let version = input.read_u8()?;
        if version != ENVELOPE_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let body = input.read_bytes()?;
        input.finish()?;

        Ok(Self {
            kind,
            version,
            body,
        })
    }

    /// Rebuild the concrete job carried by this envelope
    pub fn into_job(self) -> Result<Arc<dyn Job>, CodecError> {
        let mut input = DataInput::new(self.body);
        let job = (self.kind.decoder())(&mut input)?;
        input.finish()?;
        Ok(job)
    }
}

/// Encode a job for the wire; in-process-only jobs are rejected
pub fn encode_job(job: &dyn Job) -> Result<Bytes, CodecError> {
    let streamable = job
        .as_streamable()
        .ok_or(CodecError::NotStreamable(job.name()))?;
    JobEnvelope::of(streamable)?.encode()
}

pub fn decode_job(bytes: Bytes) -> Result<Arc<dyn Job>, CodecError> {
    JobEnvelope::decode(bytes)?.into_job()
}

// ============================================================================
// Outcomes
// ============================================================================

pub fn encode_outcome(outcome: &JobOutcome) -> Result<Bytes, CodecError> {
    let mut out = DataOutput::new();
    match outcome {
        Ok(None) => out.write_u8(OUTCOME_EMPTY),
        Ok(Some(value)) => {
            out.write_u8(OUTCOME_VALUE);
            write_value(&mut out, value);
        }
        Err(failure) => {
            out.write_u8(OUTCOME_FAILURE);
            out.write_string(&failure.message);
        }
    }
    out.finish()
}

pub fn decode_outcome(bytes: Bytes) -> Result<JobOutcome, CodecError> {
    let mut input = DataInput::new(bytes);
    let outcome = match input.read_u8()? {
        OUTCOME_EMPTY => Ok(None),
        OUTCOME_VALUE => Ok(Some(read_value(&mut input)?)),
        OUTCOME_FAILURE => Err(JobFailure::new(input.read_string()?)),
        other => return Err(CodecError::UnknownStatus(other)),
    };
    input.finish()?;
    Ok(outcome)
}

fn write_value(out: &mut DataOutput, value: &JobValue) {
    match value {
        JobValue::Bool(v) => {
            out.write_u8(VALUE_BOOL);
            out.write_bool(*v);
        }
        JobValue::Int(v) => {
            out.write_u8(VALUE_INT);
            out.write_i64(*v);
        }
        JobValue::Text(v) => {
            out.write_u8(VALUE_TEXT);
            out.write_string(v);
        }
        JobValue::Bytes(v) => {
            out.write_u8(VALUE_BYTES);
            out.write_bytes(v);
        }
    }
}

fn read_value(input: &mut DataInput) -> Result<JobValue, CodecError> {
    match input.read_u8()? {
        VALUE_BOOL => Ok(JobValue::Bool(input.read_bool()?)),
        VALUE_INT => Ok(JobValue::Int(input.read_i64()?)),
        VALUE_TEXT => Ok(JobValue::Text(input.read_string()?)),
        VALUE_BYTES => Ok(JobValue::Bytes(input.read_bytes()?)),
        other => Err(CodecError::UnknownValueTag(other)),
    }
}
