use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum number of ASCII characters in a source mnemonic.
const MAX_MNEMONIC_LEN: usize = 4;

/// Errors produced when composing a source identifier from a mnemonic.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SourceMnemonicError {
    #[error("source mnemonic is empty")]
    Empty,

    #[error("source mnemonic {0:?} is longer than {MAX_MNEMONIC_LEN} characters")]
    TooLong(String),

    #[error("source mnemonic {mnemonic:?} contains invalid character {character:?}")]
    InvalidCharacter { mnemonic: String, character: char },
}

/// Pack an up-to-4-ASCII-character mnemonic into an integer source identifier.
///
/// Characters are restricted to ASCII alphanumerics, matching the identifiers the
/// upstream feed is able to carry in the high bits of an event index.
pub fn compose_source_id(mnemonic: &str) -> Result<i32, SourceMnemonicError> {
    if mnemonic.is_empty() {
        return Err(SourceMnemonicError::Empty);
    }

    if mnemonic.len() > MAX_MNEMONIC_LEN {
        return Err(SourceMnemonicError::TooLong(mnemonic.to_string()));
    }

    let mut id = 0i32;
    for character in mnemonic.chars() {
        if !character.is_ascii_alphanumeric() {
            return Err(SourceMnemonicError::InvalidCharacter {
                mnemonic: mnemonic.to_string(),
                character,
            });
        }

        id = (id << 8) | character as i32;
    }

    Ok(id)
}

/// Unpack an integer source identifier back into its ASCII mnemonic.
///
/// Identifiers below the special-id range that do not decode to alphanumeric ASCII
/// render as their decimal value.
pub fn decompose_source_id(id: i32) -> SmolStr {
    let mut characters = Vec::with_capacity(MAX_MNEMONIC_LEN);
    let mut rest = id;

    while rest != 0 {
        let byte = (rest & 0xFF) as u8;
        if !byte.is_ascii_alphanumeric() {
            return SmolStr::new(id.to_string());
        }
        characters.push(byte as char);
        rest >>= 8;
    }

    if characters.is_empty() {
        return SmolStr::new_static("DEFAULT");
    }

    characters.iter().rev().collect::<String>().into()
}

/// Provenance tag on an indexed event. Forms the partition used by transactional
/// models and the market-depth book.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexedEventSource {
    id: i32,
    name: SmolStr,
}

impl IndexedEventSource {
    /// Identifier of the default source.
    pub const DEFAULT_ID: i32 = 0;

    /// The default source for all events that do not have multiple sources, and for
    /// all time-series events.
    pub fn default_source() -> Self {
        Self {
            id: Self::DEFAULT_ID,
            name: SmolStr::new_static("DEFAULT"),
        }
    }

    /// Construct a source with the given identifier and mnemonic.
    pub fn new(id: i32, name: impl Into<SmolStr>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }
}

impl Default for IndexedEventSource {
    fn default() -> Self {
        Self::default_source()
    }
}

impl PartialEq for IndexedEventSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexedEventSource {}

impl Hash for IndexedEventSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for IndexedEventSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Capability bits of an [`OrderSource`].
pub mod order_source_flags {
    /// Source supports publishing of events.
    pub const PUB: u32 = 0x0001;
    /// Source provides full-order-book pricing.
    pub const FULL_ORDER_BOOK: u32 = 0x0002;
}

/// Identifies the source of order-family events, with capability bits on top of the
/// plain [`IndexedEventSource`] identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderSource {
    id: i32,
    name: SmolStr,
    flags: u32,
}

/// Well-known order sources: (mnemonic, capability flags).
static WELL_KNOWN_SOURCES: LazyLock<Vec<(i32, &'static str, u32)>> = LazyLock::new(|| {
    use order_source_flags::{FULL_ORDER_BOOK, PUB};

    let entries: &[(&'static str, u32)] = &[
        ("NTV", PUB | FULL_ORDER_BOOK),
        ("ntv", PUB),
        ("NFX", PUB),
        ("ESPD", PUB),
        ("XNFI", PUB),
        ("ICE", PUB),
        ("ISE", PUB),
        ("DEA", PUB),
        ("DEX", PUB),
        ("BYX", PUB),
        ("BZX", PUB),
        ("IST", PUB),
        ("BI20", PUB),
        ("ABE", PUB),
        ("FAIR", PUB),
        ("GLBX", PUB | FULL_ORDER_BOOK),
        ("ERIS", PUB),
        ("XEUR", PUB),
        ("CFE", PUB),
        ("C2OX", PUB),
        ("SMFE", PUB | FULL_ORDER_BOOK),
        ("MEMX", PUB | FULL_ORDER_BOOK),
    ];

    entries
        .iter()
        .map(|(name, flags)| {
            let id = compose_source_id(name).expect("well-known mnemonic is valid");
            (id, *name, *flags)
        })
        .collect()
});

impl OrderSource {
    /// The default order source.
    pub fn default_source() -> Self {
        Self {
            id: IndexedEventSource::DEFAULT_ID,
            name: SmolStr::new_static("DEFAULT"),
            flags: 0,
        }
    }

    /// NASDAQ Total View.
    pub fn ntv() -> Self {
        Self::from_name("NTV").expect("well-known mnemonic is valid")
    }

    /// NASDAQ Total View, delayed.
    pub fn ntv_delayed() -> Self {
        Self::from_name("ntv").expect("well-known mnemonic is valid")
    }

    /// NASDAQ Futures Exchange.
    pub fn nfx() -> Self {
        Self::from_name("NFX").expect("well-known mnemonic is valid")
    }

    /// Intercontinental Exchange.
    pub fn ice() -> Self {
        Self::from_name("ICE").expect("well-known mnemonic is valid")
    }

    /// CME Globex.
    pub fn glbx() -> Self {
        Self::from_name("GLBX").expect("well-known mnemonic is valid")
    }

    /// Members Exchange.
    pub fn memx() -> Self {
        Self::from_name("MEMX").expect("well-known mnemonic is valid")
    }

    /// Resolve a source by mnemonic. Well-known mnemonics carry their capability bits;
    /// any other up-to-4-ASCII mnemonic resolves to a source with no capabilities.
    pub fn from_name(name: &str) -> Result<Self, SourceMnemonicError> {
        if name == "DEFAULT" {
            return Ok(Self::default_source());
        }

        let id = compose_source_id(name)?;

        let flags = WELL_KNOWN_SOURCES
            .iter()
            .find(|(known_id, _, _)| *known_id == id)
            .map(|(_, _, flags)| *flags)
            .unwrap_or(0);

        Ok(Self {
            id,
            name: SmolStr::new(name),
            flags,
        })
    }

    /// Resolve a source by identifier, decoding the mnemonic from the packed bytes.
    pub fn from_id(id: i32) -> Self {
        if id == IndexedEventSource::DEFAULT_ID {
            return Self::default_source();
        }

        let (name, flags) = WELL_KNOWN_SOURCES
            .iter()
            .find(|(known_id, _, _)| *known_id == id)
            .map(|(_, name, flags)| (SmolStr::new_static(name), *flags))
            .unwrap_or_else(|| (decompose_source_id(id), 0));

        Self { id, name, flags }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// Whether events from this source may be published.
    pub fn is_publishable(&self) -> bool {
        self.flags & order_source_flags::PUB != 0
    }

    /// Whether this source provides full-order-book pricing.
    pub fn supports_full_order_book(&self) -> bool {
        self.flags & order_source_flags::FULL_ORDER_BOOK != 0
    }
}

impl Default for OrderSource {
    fn default() -> Self {
        Self::default_source()
    }
}

impl PartialEq for OrderSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OrderSource {}

impl Hash for OrderSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for OrderSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Tagged union over the two source families, used in subscriptions and model
/// configuration. Equality and hashing are defined on the identifier alone, so an
/// [`OrderSource`] and an [`IndexedEventSource`] with the same id compare equal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum EventSource {
    Indexed(IndexedEventSource),
    Order(OrderSource),
}

impl EventSource {
    /// The default source.
    pub fn default_source() -> Self {
        Self::Indexed(IndexedEventSource::default_source())
    }

    pub fn id(&self) -> i32 {
        match self {
            EventSource::Indexed(source) => source.id(),
            EventSource::Order(source) => source.id(),
        }
    }

    pub fn name(&self) -> &SmolStr {
        match self {
            EventSource::Indexed(source) => source.name(),
            EventSource::Order(source) => source.name(),
        }
    }

    /// Whether this is the default source.
    pub fn is_default(&self) -> bool {
        self.id() == IndexedEventSource::DEFAULT_ID
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::default_source()
    }
}

impl From<IndexedEventSource> for EventSource {
    fn from(value: IndexedEventSource) -> Self {
        Self::Indexed(value)
    }
}

impl From<OrderSource> for EventSource {
    fn from(value: OrderSource) -> Self {
        Self::Order(value)
    }
}

impl PartialEq for EventSource {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EventSource {}

impl Hash for EventSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Display for EventSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
