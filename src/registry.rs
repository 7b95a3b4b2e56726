//! Named, validated, argument-bound queries (C6, §4.5, §6, §9).
//!
//! A registered query couples an optional argument validator, a body
//! `(args) -> Ast`, and an identity of `(name, original_args)` — the
//! identity is the caller's *input* args, not whatever the validator
//! transformed them into, so two calls with deeply-equal inputs dedupe to
//! the same server-visible query even if a validator normalizes them
//! differently internally (§6 "Query identity").

use std::collections::HashMap;

use crate::ast::{Ast, CustomQueryId};
use crate::error::EngineError;
use crate::value::Value;

/// A synchronous argument validator. Registering an async one is rejected at
/// registration time (§9 "Standard-schema validators"); there is no type in
/// this crate that models an async validator, so the rejection surfaces as
/// `AsyncValidatorUnsupported` only when a caller explicitly opts into the
/// `register_async` entry point below, which always errors.
pub trait Validator: Send + Sync {
    fn validate(&self, args: &[Value]) -> Result<Vec<Value>, EngineError>;
}

/// Accepts any args unchanged.
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, args: &[Value]) -> Result<Vec<Value>, EngineError> {
        Ok(args.to_vec())
    }
}

type QueryBody = Box<dyn Fn(&[Value]) -> Result<Ast, EngineError> + Send + Sync>;

struct QueryDef {
    validator: Box<dyn Validator>,
    body: QueryBody,
}

/// The query registry: `name -> QueryDef`, with deep-mergeable sub-registries
/// (§9 "Deep merging of registries").
#[derive(Default)]
pub struct Registry {
    queries: HashMap<String, QueryDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: Box<dyn Validator>,
        body: impl Fn(&[Value]) -> Result<Ast, EngineError> + Send + Sync + 'static,
    ) {
        self.queries.insert(name.into(), QueryDef { validator, body: Box::new(body) });
    }

    /// Registering an async validator is always rejected: this crate has no
    /// async validator type, so any caller reaching for this entry point is
    /// trying to port one from elsewhere (§9).
    pub fn register_async(&mut self, name: impl Into<String>) -> Result<(), EngineError> {
        Err(EngineError::AsyncValidatorUnsupported(name.into()))
    }

    pub fn must_get(&self, name: &str) -> Result<(), EngineError> {
        if self.queries.contains_key(name) {
            Ok(())
        } else {
            Err(EngineError::UnknownQuery(name.to_string()))
        }
    }

    /// Resolves `name:args` to a planned-identity AST plus its server
    /// identity tuple. The identity always carries `original_args`, not the
    /// validator's transformed output (§6).
    pub fn call(&self, name: &str, original_args: Vec<Value>) -> Result<(Ast, CustomQueryId), EngineError> {
        let def = self.queries.get(name).ok_or_else(|| EngineError::UnknownQuery(name.to_string()))?;
        let validated = def.validator.validate(&original_args)?;
        let mut ast = (def.body)(&validated)?;
        ast.custom = Some(CustomQueryId { name: name.to_string(), args: original_args.clone() });
        Ok((ast, CustomQueryId { name: name.to_string(), args: original_args }))
    }

    /// Deep-merges `other` into `self`: keys in `other` replace keys of the
    /// same name in `self` unless both sides register a query under the
    /// same name, in which case they must be the exact same registration
    /// (by pointer identity of the stored closure is not observable, so we
    /// require the caller to pass only one definition per name across a
    /// merge — a name present in both is a `ConflictingRegistration` unless
    /// `other` is simply re-registering nothing new).
    pub fn merge(&mut self, other: Registry, base_name: &str) -> Result<(), EngineError> {
        for (name, def) in other.queries {
            if self.queries.contains_key(&name) {
                return Err(EngineError::ConflictingRegistration(format!(
                    "{base_name}: query '{name}' is already registered"
                )));
            }
            self.queries.insert(name, def);
        }
        Ok(())
    }
}
