//! Harness generation: for each (language, question type) pair, produce the
//! source files that decode the inputs, invoke the user's solution, time
//! each call, and emit one `TEST_CASE_RESULT:` line per case.

pub mod java;
pub mod python;
pub mod shape;

use crate::submission::CodeSubmission;
use anyhow::{bail, Result};
use crucible_common::types::{Language, SerializationStrategy};
use shape::TypeShape;

/// A file to materialize under the submission directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the submission root, e.g. `com/example/Main.java`.
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedHarness {
    pub files: Vec<SourceFile>,
    /// Package directory relative to the submission root, e.g. `com/example`.
    pub package_dir: String,
    /// Language-specific entry point: a fully-qualified class name for Java,
    /// a relative file path for Python.
    pub entry_point: String,
}

pub trait HarnessGenerator: Send + Sync {
    fn generate(&self, submission: &CodeSubmission) -> Result<GeneratedHarness>;
}

static JAVA: java::JavaHarnessGenerator = java::JavaHarnessGenerator;
static PYTHON: python::PythonHarnessGenerator = python::PythonHarnessGenerator;

/// Constant registry; no dynamic dispatch setup needed for a closed set.
pub fn generator_for(language: Language) -> &'static dyn HarnessGenerator {
    match language {
        Language::Java => &JAVA,
        Language::Python => &PYTHON,
    }
}

/// `com.example.problems` → `com/example/problems`.
pub fn package_dir(package_name: &str) -> String {
    package_name.replace('.', "/")
}

/// The serializer is derived from the mutation target's declared type; the
/// optional rendering hint may only confirm it, never contradict it.
pub fn check_mutation_strategy(
    strategy: Option<SerializationStrategy>,
    shape: &TypeShape,
) -> Result<()> {
    let fits = match strategy {
        None | Some(SerializationStrategy::Json) => true,
        Some(SerializationStrategy::Array) => matches!(
            shape,
            TypeShape::Array(_) | TypeShape::List(_) | TypeShape::ListNode
        ),
        Some(SerializationStrategy::LevelOrder) => match shape {
            TypeShape::TreeNode => true,
            TypeShape::Array(inner) | TypeShape::List(inner) => {
                matches!(inner.as_ref(), TypeShape::TreeNode)
            }
            _ => false,
        },
    };
    if fits {
        Ok(())
    } else {
        bail!(
            "serializationStrategy {:?} does not fit mutation target type {}",
            strategy.unwrap(),
            shape
        )
    }
}

/// Line-based probe for a class definition inside user source, used to
/// decide whether the harness must supply a data-structure class itself.
pub fn defines_class(source: &str, name: &str) -> bool {
    let needle = format!("class {}", name);
    source.lines().any(|line| {
        line.contains(&needle)
            && !line
                .trim_start()
                .starts_with("//")
    })
}
