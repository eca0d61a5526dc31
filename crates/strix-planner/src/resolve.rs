//! Argument resolution
//!
//! Turns one bundle into the final token list of a command line:
//! 1. every argument folds the parse output of its matching entities
//!    (primary kind first, fallback kind when none is in the bundle)
//! 2. the argument fragment is rendered with the accumulated values
//! 3. fragments, command, intensity and output path fill the configuration
//!    template, which is split into tokens honoring quotes

use crate::error::ResolveError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use strix_model::template;
use strix_model::{
    Argument, Configuration, Entity, FilterContext, Intensity, ParsedArgs, Tool, TypeRegistry,
};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\s'"]*['"][^'"]+['"]|[^'"\s]+"#).unwrap_or_else(|e| panic!("token pattern: {e}"))
});

/// Everything resolution needs besides the bundle and configuration
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Input type forest
    pub registry: &'a TypeRegistry,
    /// Tool owning the configuration
    pub tool: &'a Tool,
    /// Selected intensity
    pub intensity: &'a Intensity,
    /// Report path rendered into `{output}`
    pub output: Option<&'a str>,
    /// Filter context of the task's target
    pub filter: FilterContext<'a>,
}

/// Resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Tokens in order, including the command
    pub tokens: Vec<String>,
    /// Entities whose values were used, in argument order
    pub used: Vec<Entity>,
}

impl ResolvedCommand {
    /// Split leading `KEY=value` tokens placed before the command into
    /// environment variables. Returns `(environment, argv)`.
    #[must_use]
    pub fn split_environment(&self, command: &str) -> (Vec<(String, String)>, Vec<String>) {
        let Some(at) = self.tokens.iter().position(|t| t == command) else {
            return (Vec::new(), self.tokens.clone());
        };
        let mut env = Vec::new();
        let mut argv = Vec::with_capacity(self.tokens.len());
        for (i, token) in self.tokens.iter().enumerate() {
            match token.split_once('=') {
                Some((key, value)) if i < at => env.push((key.to_string(), value.to_string())),
                _ => argv.push(token.clone()),
            }
        }
        (env, argv)
    }
}

/// Resolve the command line of one bundle
pub fn resolve(
    bundle: &[Entity],
    configuration: &Configuration,
    ctx: &ResolveContext<'_>,
) -> Result<ResolvedCommand, ResolveError> {
    let mut fragments: HashMap<&str, String> = HashMap::new();
    let mut used: Vec<Entity> = Vec::new();

    for argument in &configuration.arguments {
        let (parsed, matched) = fold_argument(bundle, argument, ctx);
        if matched.is_empty() {
            if argument.required {
                return Err(ResolveError::MissingArgument {
                    argument: argument.name.clone(),
                    tool: ctx.tool.name.clone(),
                });
            }
            fragments.insert(argument.name.as_str(), String::new());
            continue;
        }
        let fragment = template::render(&argument.template, |name| parsed.lookup(name)).map_err(|source| {
            ResolveError::Template {
                owner: format!("{}/{}", configuration.key(), argument.name),
                source,
            }
        })?;
        fragments.insert(argument.name.as_str(), fragment);
        for entity in matched {
            if !used.iter().any(|u| u.id() == entity.id()) {
                used.push(entity);
            }
        }
    }

    let line = template::render(&configuration.template, |name| match name {
        "command" => Some(ctx.tool.command.clone()),
        "script" => Some(ctx.tool.script.clone().unwrap_or_default()),
        "intensity" => Some(ctx.intensity.argument.clone()),
        "output" => Some(ctx.output.unwrap_or_default().to_string()),
        other => fragments.get(other).cloned(),
    })
    .map_err(|source| ResolveError::Template {
        owner: configuration.key(),
        source,
    })?;

    let mut tokens = tokenize(&line);
    if !tokens.iter().any(|t| t == &ctx.tool.command) {
        tokens.insert(0, ctx.tool.command.clone());
    }
    Ok(ResolvedCommand { tokens, used })
}

/// Whether a bundle resolves
#[must_use]
pub fn check(bundle: &[Entity], configuration: &Configuration, ctx: &ResolveContext<'_>) -> bool {
    resolve(bundle, configuration, ctx).is_ok()
}

fn fold_argument(bundle: &[Entity], argument: &Argument, ctx: &ResolveContext<'_>) -> (ParsedArgs, Vec<Entity>) {
    let mut parsed = ParsedArgs::new();
    let mut matched = Vec::new();

    for input in &argument.inputs {
        let Some(input_type) = ctx.registry.get(input.input_type) else {
            continue;
        };
        let mut pool: Vec<&Entity> = bundle.iter().filter(|e| e.kind() == input_type.primary).collect();
        if pool.is_empty() {
            if let Some(fallback) = input_type.fallback {
                pool = bundle.iter().filter(|e| e.kind() == fallback).collect();
            }
        }

        for entity in pool.into_iter().filter(|e| e.accepts(&input.filter, &ctx.filter)) {
            entity.parse_into(&mut parsed);
            matched.push(entity.clone());
            if !argument.multiple {
                break;
            }
        }
        if !matched.is_empty() {
            break;
        }
    }
    (parsed, matched)
}

/// Split a command line on whitespace, keeping quoted substrings together
/// and dropping the quote characters
#[must_use]
pub fn tokenize(line: &str) -> Vec<String> {
    TOKEN
        .find_iter(line)
        .map(|m| m.as_str().replace(['"', '\''], ""))
        .filter(|t| !t.is_empty())
        .collect()
}
