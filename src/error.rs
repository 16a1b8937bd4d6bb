use std::fmt;

use crate::ObjectId;

/// Top level error type returned by every fallible operation in the crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("xref error: {0}")]
    Xref(#[from] XrefError),

    #[error("decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("function evaluation error: {0}")]
    Function(#[from] FunctionError),

    #[error("object at offset {0} could not be read")]
    InvalidOffset(usize),

    #[error("dictionary is missing xref entry")]
    MissingXrefEntry,

    #[error("reference cycle detected resolving object {}  {}", (.0).0, (.0).1)]
    ReferenceCycle(ObjectId),

    #[error("object is not a {0}")]
    Type(&'static str),

    #[error("dictionary key {0:?} not found")]
    DictKey(Vec<u8>),

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("numeric cast failed: {0}")]
    NumericCast(String),

    #[error("unresolved reference ({} {} R) treated as Null", (.0).0, (.0).1)]
    UnresolvedReference(ObjectId),

    #[error("incremental write conflicts with base document: {0}")]
    IncrementalConflict(String),

    #[error("feature not implemented: {0}")]
    Unimplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("file does not start with a valid %PDF- header")]
    InvalidFileHeader,

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("literal string nesting exceeds the maximum allowed depth")]
    StringNestingTooDeep,

    #[error("array or dictionary nesting exceeds the maximum allowed depth")]
    ContainerNestingTooDeep,

    #[error("stream object is missing its dictionary")]
    MissingStreamDictionary,

    #[error("stream `endstream` keyword not found")]
    TruncatedStream,

    #[error("stream Length entry forms a circular reference")]
    CircularLength,

    #[error("invalid xref subsection")]
    InvalidXref,

    #[error("invalid object stream")]
    InvalidObjectStream,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XrefError {
    #[error("could not locate startxref / xref table")]
    Start,

    #[error("Prev offset in trailer is out of range")]
    PrevStart,

    #[error("XRefStm offset in trailer is out of range")]
    StreamStart,

    #[error("xref stream is missing the W (widths) entry")]
    MissingWidths,

    #[error("xref stream W entry must have exactly 3 elements")]
    InvalidWidths,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("incorrect password")]
    AuthFailed,

    #[error("unsupported encryption V/R combination (V={v}, R={r})")]
    UnsupportedEncryption { v: i64, r: i64 },

    #[error("encryption dictionary is missing required field {0}")]
    MissingField(&'static str),

    #[error("ciphertext length is not a multiple of the cipher block size")]
    InvalidCiphertextLength,

    #[error("AES padding is invalid")]
    InvalidPadding,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("inflate failed: {0}")]
    Inflate(String),

    #[error("LZW stream is malformed: {0}")]
    Lzw(String),

    #[error("ASCII85 stream contains an invalid byte")]
    InvalidAscii85,

    #[error("ASCIIHex stream contains a non-hex-digit byte")]
    InvalidAsciiHex,

    #[error("run length stream is truncated")]
    TruncatedRunLength,

    #[error("predictor row length mismatch: expected {expected}, row zero-filled")]
    PredictorMismatch { expected: usize },

    #[error("unknown predictor value {0}")]
    UnknownPredictor(i64),

    #[error("CCITT decode error: {0}")]
    Ccitt(String),

    #[error("JBIG2 decode error: {0}")]
    Jbig2(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("unsupported function type {0}")]
    UnsupportedType(i64),

    #[error("function is missing required Domain entry")]
    MissingDomain,

    #[error("stitching function is missing required Encode entry")]
    MissingEncode,

    #[error("sampled function is missing required entry: {0}")]
    MissingSampledField(&'static str),

    #[error("stitching function Bounds/Functions/Encode length mismatch")]
    StitchingLengthMismatch,

    #[error("PostScript calculator syntax error: {0}")]
    PostScriptSyntax(String),

    #[error("PostScript calculator stack underflow")]
    StackUnderflow,

    #[error("function input arity mismatch: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

impl fmt::Display for crate::object::StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            crate::object::StringFormat::Literal => write!(f, "literal"),
            crate::object::StringFormat::Hexadecimal => write!(f, "hexadecimal"),
        }
    }
}
