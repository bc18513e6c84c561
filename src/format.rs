//! Format negotiation: which advertised payload formats the target takes.

use x11rb::protocol::xproto::Atom;

use crate::error::LookupError;

/// MIME name for URI lists, accepted by default.
pub const MIME_URI_LIST: &str = "text/uri-list";
/// MIME name for plain text, accepted by default.
pub const MIME_TEXT_PLAIN: &str = "text/plain";

/// Decides which advertised payload formats are acceptable.
///
/// Candidates are compared by their resolved names, case-sensitively, against
/// a fixed set. Selection is first-acceptable-match in peer order, not best
/// match: if the peer lists `text/plain` before `text/uri-list` and both are
/// acceptable, `text/plain` is chosen.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    accepted: Vec<String>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry {
            accepted: vec![MIME_URI_LIST.to_string(), MIME_TEXT_PLAIN.to_string()],
        }
    }
}

impl FormatRegistry {
    /// Registry accepting the given names instead of the defaults.
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FormatRegistry {
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a resolved format name is acceptable.
    pub fn is_acceptable(&self, name: &str) -> bool {
        self.accepted.iter().any(|accepted| accepted == name)
    }

    /// First candidate whose resolved name is acceptable, in peer order.
    ///
    /// Names are resolved lazily through `resolve`; candidates after the
    /// first match are never looked up. `Ok(None)` is a normal negotiation
    /// outcome, not an error: the peer offers nothing this target takes and
    /// the drop will be answered with a reject.
    pub fn select<R>(&self, candidates: &[Atom], resolve: R) -> Result<Option<Atom>, LookupError>
    where
        R: Fn(Atom) -> Result<String, LookupError>,
    {
        for &candidate in candidates {
            let name = resolve(candidate)?;
            if self.is_acceptable(&name) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
