use credence_core::FunctionArgs;
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::transcript::ChatbotContext;

type AdapterFunction<A> =
    Box<dyn Fn(&mut A, &FunctionArgs, &mut ChatbotContext<'_>) -> anyhow::Result<()>>;

/// Named side effects a script can trigger with a function call.
pub struct FunctionRegistry<A> {
    functions: BTreeMap<String, AdapterFunction<A>>,
}

impl<A> Default for FunctionRegistry<A> {
    fn default() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }
}

impl<A> std::fmt::Debug for FunctionRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl<A> FunctionRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> Result<(), EngineError>
    where
        F: Fn(&mut A, &FunctionArgs, &mut ChatbotContext<'_>) -> anyhow::Result<()> + 'static,
    {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(EngineError::DuplicateFunction { name });
        }
        self.functions.insert(name, Box::new(function));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Run the function registered as `name`.
    ///
    /// Engine runs check every scripted name before starting, so an unknown
    /// name only reaches this error when the registry is driven directly.
    pub fn call(
        &self,
        name: &str,
        adapter: &mut A,
        args: &FunctionArgs,
        ctx: &mut ChatbotContext<'_>,
    ) -> anyhow::Result<()> {
        match self.functions.get(name) {
            Some(function) => function(adapter, args, ctx),
            None => anyhow::bail!("function not defined: {name}"),
        }
    }
}

/// Fetch a required string argument.
pub fn string_arg<'a>(args: &'a FunctionArgs, name: &str) -> anyhow::Result<&'a str> {
    match args.get(name) {
        Some(serde_json::Value::String(value)) => Ok(value),
        Some(other) => anyhow::bail!("argument `{name}` must be a string, got {other}"),
        None => anyhow::bail!("missing argument `{name}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;
    use serde_json::Value;

    #[derive(Default)]
    struct Counter {
        total: i64,
    }

    fn registry() -> FunctionRegistry<Counter> {
        let mut registry = FunctionRegistry::new();
        registry
            .register("add", |counter: &mut Counter, args: &FunctionArgs, _ctx: &mut ChatbotContext<'_>| {
                let by = args
                    .get("by")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| anyhow::anyhow!("missing argument `by`"))?;
                counter.total += by;
                Ok(())
            })
            .expect("register add");
        registry
    }

    #[test]
    fn calls_registered_function_with_args() {
        let registry = registry();
        let mut counter = Counter::default();
        let mut transcript = Transcript::new();
        let mut args = FunctionArgs::new();
        args.insert("by".to_string(), Value::from(4));

        registry
            .call("add", &mut counter, &args, &mut ChatbotContext::new(&mut transcript))
            .expect("call add");
        assert_eq!(counter.total, 4);
        assert!(registry.contains("add"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["add"]);
    }

    #[test]
    fn unknown_and_duplicate_names_are_errors() {
        let mut registry = registry();
        let err = registry
            .register("add", |_: &mut Counter, _: &FunctionArgs, _: &mut ChatbotContext<'_>| Ok(()))
            .expect_err("duplicate should fail");
        assert!(matches!(err, EngineError::DuplicateFunction { ref name } if name == "add"));

        let mut transcript = Transcript::new();
        let err = registry
            .call(
                "missing",
                &mut Counter::default(),
                &FunctionArgs::new(),
                &mut ChatbotContext::new(&mut transcript),
            )
            .expect_err("unknown function");
        assert_eq!(err.to_string(), "function not defined: missing");
    }

    #[test]
    fn string_arg_reports_type_and_absence() {
        let mut args = FunctionArgs::new();
        args.insert("name".to_string(), Value::from("John"));
        args.insert("age".to_string(), Value::from(42));

        assert_eq!(string_arg(&args, "name").expect("name"), "John");
        assert!(string_arg(&args, "age")
            .expect_err("wrong type")
            .to_string()
            .contains("must be a string"));
        assert_eq!(
            string_arg(&args, "email").expect_err("absent").to_string(),
            "missing argument `email`"
        );
    }
}
