//! engine::roundtrip
//!
//! Re-serializing a document through a type's own serialization rules.
//!
//! The verifying migrator compares a migrated document with its round
//! trip: deserialize into the declared type, serialize again. Two
//! implementations ship here:
//!
//! - [`SerdeRoundTrip`] goes through real Rust types registered by the
//!   caller
//! - [`DescriptorRoundTrip`] simulates the trip from catalog metadata: the
//!   result carries exactly the type's eligible members

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::catalog::TypeKind;
use crate::core::context::MigrationContext;
use crate::core::shape::eligible_members;
use crate::core::types::TypeRef;

/// Round-trips documents of a declared type.
pub trait RoundTrip {
    /// The document after deserializing into `ty` and serializing back.
    ///
    /// Returns `Ok(None)` when this round trip cannot handle `ty`.
    fn round_trip(
        &self,
        document: &Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> anyhow::Result<Option<Value>>;
}

type Trip = Box<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Round trip through registered serde types.
#[derive(Default)]
pub struct SerdeRoundTrip {
    trips: HashMap<TypeRef, Trip>,
}

impl SerdeRoundTrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `T` as the live representation of documents declared as `ty`.
    pub fn register<T>(mut self, ty: TypeRef) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.trips.insert(
            ty,
            Box::new(|document: &Value| {
                let value: T = serde_json::from_value(document.clone())?;
                Ok(serde_json::to_value(value)?)
            }),
        );
        self
    }
}

impl RoundTrip for SerdeRoundTrip {
    fn round_trip(
        &self,
        document: &Value,
        ty: &TypeRef,
        _ctx: &MigrationContext<'_>,
    ) -> anyhow::Result<Option<Value>> {
        self.trips.get(ty).map(|trip| trip(document)).transpose()
    }
}

impl std::fmt::Debug for SerdeRoundTrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.trips.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("SerdeRoundTrip").field("types", &types).finish()
    }
}

/// Round trip simulated from catalog descriptors.
///
/// Composite documents keep exactly the eligible members of the declared
/// type; members absent from the document come back as `null`. Other
/// kinds of type are not handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorRoundTrip;

impl RoundTrip for DescriptorRoundTrip {
    fn round_trip(
        &self,
        document: &Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> anyhow::Result<Option<Value>> {
        let Some(desc) = ctx.catalog().describe(ty.name()) else {
            anyhow::bail!("unknown type '{}'", ty.name());
        };
        if desc.kind != TypeKind::Composite {
            return Ok(None);
        }
        let Value::Object(fields) = document else {
            anyhow::bail!("expected an object for composite type '{ty}'");
        };

        let mut out = Map::new();
        for member in eligible_members(desc, &[]) {
            let value = fields.get(&member.name).cloned().unwrap_or(Value::Null);
            out.insert(member.name.clone(), value);
        }
        Ok(Some(Value::Object(out)))
    }
}
