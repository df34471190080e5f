// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The headless device's stand-in for a GLSL compiler and linker.
//!
//! Compiling checks structure only: brackets must balance, `main` must be defined and `#error`
//! directives fail.  Linking reads the input declarations of every attached stage and keeps
//! the ones some stage actually uses, the way a driver's optimizer drops dead inputs.

use crate::images::reflection::{self, ActiveInput, Declaration, SlotRole};
use crate::images::shader::StageKind;
use std::collections::BTreeSet;

/// Which driver's log format the headless compiler imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiagnosticStyle {
    /// `0(12) : error C0000: ...`
    Nvidia,
    /// `ERROR: 0:12: ...`
    #[default]
    AtiIntel,
    /// `0:12(1): error: ...`
    Nouveau,
}

impl DiagnosticStyle {
    pub(super) fn format(self, line: usize, message: &str) -> String {
        match self {
            DiagnosticStyle::Nvidia => format!("0({line}) : error C0000: {message}"),
            DiagnosticStyle::AtiIntel => format!("ERROR: 0:{line}: {message}"),
            DiagnosticStyle::Nouveau => format!("0:{line}(1): error: {message}"),
        }
    }
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Checks `source`, returning the failing line (0 when none applies) and a message.
pub(super) fn check(source: &str) -> Result<(), (usize, String)> {
    let text = reflection::strip_comments(source);
    let mut open: Vec<(char, usize)> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        if let Some(directive) = line.trim_start().strip_prefix('#') {
            let directive = directive.trim_start();
            if directive == "error" || directive.starts_with("error ") {
                return Err((number, format!("#{}", directive.trim_end())));
            }
            continue;
        }
        for c in line.chars() {
            match c {
                '(' | '[' | '{' => open.push((c, number)),
                ')' | ']' | '}' => match open.pop() {
                    Some((o, _)) if closing(o) == c => {}
                    _ => return Err((number, format!("syntax error, unexpected '{c}'"))),
                },
                _ => {}
            }
        }
    }
    if let Some((c, number)) = open.pop() {
        return Err((number, format!("syntax error, '{c}' is never closed")));
    }
    if !reflection::identifiers(&text).contains("main") {
        return Err((0, "no definition of main".to_string()));
    }
    Ok(())
}

/// Links compiled stage sources into the table of active inputs.
///
/// Uniforms and attributes get locations in separate ranges, in order of first declaration.
pub(super) fn link(stages: &[(StageKind, &str)]) -> Result<Vec<ActiveInput>, String> {
    for required in [StageKind::Vertex, StageKind::Fragment] {
        if !stages.iter().any(|(kind, _)| *kind == required) {
            return Err(format!("error: program has no {required} shader"));
        }
    }
    let mut declared: Vec<Declaration> = Vec::new();
    let mut used = BTreeSet::new();
    for (kind, source) in stages {
        let (found, body) = reflection::split_declarations(source, *kind);
        used.extend(reflection::identifiers(&body));
        for declaration in found {
            match declared.iter().find(|d| d.name == declaration.name) {
                Some(existing)
                    if existing.slot_type != declaration.slot_type
                        || existing.role != declaration.role =>
                {
                    return Err(format!(
                        "error: {} is declared as both {} and {}",
                        declaration.name,
                        existing.slot_type.glsl_name(),
                        declaration.slot_type.glsl_name()
                    ));
                }
                Some(_) => {}
                None => declared.push(declaration),
            }
        }
    }

    let mut next_uniform = 0;
    let mut next_attribute = 0;
    Ok(declared
        .into_iter()
        .filter(|d| used.contains(reflection::base_name(&d.name)))
        .map(|d| {
            let counter = match d.role {
                SlotRole::Uniform => &mut next_uniform,
                SlotRole::Attribute => &mut next_attribute,
            };
            let location = *counter;
            *counter += 1;
            ActiveInput {
                name: d.name,
                location,
                slot_type: d.slot_type,
                role: d.role,
            }
        })
        .collect())
}
