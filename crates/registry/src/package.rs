//! Destinations package - the external source of destination factories
//!
//! A package exposes typed exports instead of relying on reflection: either a
//! registry object mapping type names to factories, or individual constructors
//! named `create<Type>Destination`.

use std::collections::HashMap;

use contracts::DestinationFactory;

use crate::error::LoaderError;

const CONSTRUCTOR_PREFIX: &str = "create";
const CONSTRUCTOR_SUFFIX: &str = "Destination";

/// One export of a destinations package
pub enum PackageExport {
    /// Explicit type name to factory map
    Registry(HashMap<String, DestinationFactory>),
    /// Single constructor; the type name is derived from `name`
    Constructor {
        name: String,
        factory: DestinationFactory,
    },
}

impl PackageExport {
    pub fn constructor(name: impl Into<String>, factory: DestinationFactory) -> Self {
        Self::Constructor {
            name: name.into(),
            factory,
        }
    }

    /// Find the factory for `destination_type` in this export
    pub fn resolve(&self, destination_type: &str) -> Option<DestinationFactory> {
        match self {
            Self::Registry(map) => map.get(destination_type).cloned(),
            Self::Constructor { name, factory } => destination_type_from_export(name)
                .filter(|derived| derived == destination_type)
                .map(|_| factory.clone()),
        }
    }

    /// Type names this export provides
    pub fn provided_types(&self) -> Vec<String> {
        match self {
            Self::Registry(map) => map.keys().cloned().collect(),
            Self::Constructor { name, .. } => {
                destination_type_from_export(name).into_iter().collect()
            }
        }
    }
}

/// Source of destination factories resolved at call time
pub trait DestinationPackage: Send + Sync {
    /// Package name, for diagnostics
    fn name(&self) -> &str;

    /// Current exports. An error means the package itself cannot be used.
    fn exports(&self) -> Result<Vec<PackageExport>, LoaderError>;
}

/// Derive a destination type from a constructor export name
///
/// `createGoogleAnalyticsDestination` becomes `google-analytics`. Names that do
/// not follow the `create<Type>Destination` convention yield `None`.
pub fn destination_type_from_export(name: &str) -> Option<String> {
    let core = name
        .strip_prefix(CONSTRUCTOR_PREFIX)?
        .strip_suffix(CONSTRUCTOR_SUFFIX)?;

    if !core.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }

    Some(to_kebab_case(core))
}

/// PascalCase to kebab-case; acronym runs stay together (`HubSpotCRM` -> `hub-spot-crm`)
fn to_kebab_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('-');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}
