//! Document assembly: route decoded section elements into a [`Bundle`].

use super::Bundle;
use crate::decode::{Decoder, Identity, Node, NodeKind, Record, Scalar, TypeSpec};
use crate::decode::{FILES, PACKAGES, USERS};
use crate::errors::{codes, Diagnostic, Diagnostics, LoadError};
use crate::model::{Declared, Entry};

/// Assemble one document into a partial bundle.
///
/// Malformed elements and unknown sections are reported and skipped. Only a
/// document root that is neither a mapping nor empty is an error.
pub fn assemble(
    document: &Node,
    decoder: &Decoder,
    diags: &mut Diagnostics,
) -> Result<Bundle, LoadError> {
    let mut bundle = Bundle::new();

    let sections = match &document.kind {
        NodeKind::Scalar(Scalar::Null) => return Ok(bundle),
        NodeKind::Mapping(sections) => sections,
        _ => {
            return Err(LoadError::NotABundle {
                found: document.id(),
                mark: document.mark.clone(),
            })
        }
    };

    for (key, value) in sections {
        let name = key.as_scalar().map(Scalar::render).unwrap_or_default();
        let spec: &TypeSpec = match name.as_str() {
            "files" => &FILES,
            "packages" => &PACKAGES,
            "users" => &USERS,
            _ => {
                diags.push(
                    Diagnostic::new(
                        codes::W_UNRECOGNIZED_SECTION,
                        format!("unrecognized section `{}'", name),
                    )
                    .with_mark(&value.mark),
                );
                continue;
            }
        };

        let elements: &[Node] = match &value.kind {
            NodeKind::Sequence(elements) => elements.as_slice(),
            NodeKind::Scalar(Scalar::Null) => &[],
            _ => {
                diags.push(
                    Diagnostic::new(
                        codes::W_SECTION_NOT_SEQUENCE,
                        format!("section `{}' must be a sequence, found {}", name, value.id()),
                    )
                    .with_mark(&value.mark),
                );
                continue;
            }
        };

        for element in elements {
            match decoder.decode(spec, element, diags) {
                Ok((identity, record)) => {
                    route(&mut bundle, spec, identity, record, element, diags)
                }
                Err(err) => diags.push(
                    Diagnostic::new(codes::W_ENTRY_OMITTED, format!("entry omitted: {}", err))
                        .with_mark(err.mark()),
                ),
            }
        }
    }

    Ok(bundle)
}

fn route(
    bundle: &mut Bundle,
    spec: &TypeSpec,
    identity: Identity,
    record: Record,
    element: &Node,
    diags: &mut Diagnostics,
) {
    match (identity, record) {
        (Identity::Path(path), Record::Entry(entry)) => {
            bundle.files.insert(path, Declared::Present(entry));
        }
        (Identity::Path(path), Record::Absent) => {
            bundle.files.insert(path, Declared::Absent);
        }
        (Identity::Pattern(pattern), Record::Entry(Entry::Bundled(template))) => {
            bundle.bundled_globs.insert(pattern, template);
        }
        (Identity::Pattern(pattern), Record::Entry(Entry::Remote(template))) => {
            bundle.remote_globs.insert(pattern, template);
        }
        (Identity::Pattern(pattern), record) => {
            let state = match &record {
                Record::Entry(entry) => entry.state(),
                _ => "absent",
            };
            diags.push(
                Diagnostic::new(
                    codes::W_GLOB_LITERAL,
                    format!(
                        "pattern {} cannot declare `{}' entries; only host and target sources can be globbed",
                        pattern, state
                    ),
                )
                .with_mark(&element.mark),
            );
        }
        (Identity::Name(name), Record::Package(package)) => {
            bundle.packages.insert(name, Declared::Present(package));
        }
        (Identity::Name(name), Record::User(user)) => {
            bundle.users.insert(name, Declared::Present(user));
        }
        (Identity::Name(name), Record::Absent) if spec.section == USERS.section => {
            bundle.users.insert(name, Declared::Absent);
        }
        (Identity::Name(name), Record::Absent) => {
            bundle.packages.insert(name, Declared::Absent);
        }
        // Path identities only come from `files` and names only from
        // `packages`/`users`; the remaining pairs cannot be produced.
        (identity, _) => {
            tracing::debug!(%identity, section = spec.section, "dropping mismatched record");
        }
    }
}
