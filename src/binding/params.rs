use std::collections::BTreeMap;

use crate::mapping::Parameter;
use crate::types::RowBounds;

use super::contract::Arg;

/// Prefix of the positional aliases added to every named parameter map.
pub const GENERIC_NAME_PREFIX: &str = "param";

/// Turns a mapper call's arguments into the statement's parameter object.
#[derive(Debug, Clone)]
pub struct ParamNameResolver {
    names: Vec<Option<String>>,
}

impl ParamNameResolver {
    #[must_use]
    pub fn new(names: &[Option<String>]) -> Self {
        Self {
            names: names.to_vec(),
        }
    }

    /// Split off the row bounds and build the parameter object.
    ///
    /// No argument gives `Parameter::None`. A single argument without a declared name is
    /// passed as is. Anything else becomes a map holding every argument under its declared name
    /// (`arg0`, `arg1`, ... when undeclared) and under `param1` ... `paramN`.
    #[must_use]
    pub fn resolve(&self, args: Vec<Arg>) -> (Parameter, RowBounds) {
        let mut bounds = RowBounds::default();
        let mut params = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Bounds(found) => bounds = found,
                Arg::Param(param) => params.push(param),
            }
        }

        let parameter = match params.len() {
            0 => Parameter::None,
            1 if self.names.first().is_none_or(Option::is_none) => {
                params.pop().unwrap_or_default()
            }
            _ => {
                let mut entries = BTreeMap::new();
                for (idx, param) in params.into_iter().enumerate() {
                    let name = self
                        .names
                        .get(idx)
                        .cloned()
                        .flatten()
                        .unwrap_or_else(|| format!("arg{idx}"));
                    let generic = format!("{GENERIC_NAME_PREFIX}{}", idx + 1);
                    if generic != name {
                        entries.entry(generic).or_insert_with(|| param.clone());
                    }
                    entries.insert(name, param);
                }
                Parameter::Map(entries)
            }
        };
        (parameter, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    #[test]
    fn single_unnamed_argument_passes_through() {
        let resolver = ParamNameResolver::new(&[None]);
        let (param, bounds) = resolver.resolve(vec![Arg::from(42_i64)]);
        assert!(matches!(param, Parameter::Value(RowValues::Int(42))));
        assert!(bounds.is_default());
    }

    #[test]
    fn named_arguments_get_positional_aliases() {
        let resolver = ParamNameResolver::new(&[Some("id".into()), None]);
        let (param, bounds) = resolver.resolve(vec![
            Arg::from(7_i64),
            Arg::from(RowBounds::new(1, 2)),
            Arg::from("bob"),
        ]);
        assert_eq!(bounds, RowBounds::new(1, 2));
        assert_eq!(param.resolve("id").unwrap(), RowValues::Int(7));
        assert_eq!(param.resolve("param1").unwrap(), RowValues::Int(7));
        assert_eq!(param.resolve("arg1").unwrap(), RowValues::Text("bob".into()));
        assert_eq!(param.resolve("param2").unwrap(), RowValues::Text("bob".into()));
    }

    #[test]
    fn no_arguments_is_none() {
        let (param, _) = ParamNameResolver::new(&[]).resolve(Vec::new());
        assert!(param.is_none());
    }
}
