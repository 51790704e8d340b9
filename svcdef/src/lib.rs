mod ast;
mod diagnostics;
mod error;
mod http;
mod idl;
mod model;
mod naming;
mod resolve;
mod stub;

pub use diagnostics::{Location, Position, Warning};
pub use error::{Error, ErrorKind, Result};
pub use model::*;

/// Output of [`build`]: the resolved definition and everything that was
/// skipped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Svcdef {
    pub definition: Definition,
    pub warnings: Vec<Warning>,
}

// Public API: build the IR of one service from its generated Go stubs and the
// proto IDL carrying its HTTP annotations. Both inputs are
// (unit identifier, text) pairs.
pub fn build<S, SK, SV, D, DK, DV>(stubs: S, idl: D) -> Result<Svcdef>
where
    S: IntoIterator<Item = (SK, SV)>,
    SK: AsRef<str>,
    SV: AsRef<str>,
    D: IntoIterator<Item = (DK, DV)>,
    DK: AsRef<str>,
    DV: AsRef<str>,
{
    let mut warnings = Vec::new();
    let mut definition = stub::analyze(stubs, &mut warnings)?;
    resolve::resolve_types(&mut definition);
    http::consolidate(&mut definition, idl)?;
    tracing::debug!(
        messages = definition.messages.len(),
        enums = definition.enums.len(),
        warnings = warnings.len(),
        "built service definition"
    );
    Ok(Svcdef {
        definition,
        warnings,
    })
}
