//! Java harness generation. Inputs are decoded at generation time into Java
//! literals; custom data structures go through `build*`/`convert*ToJson`
//! helpers emitted alongside the entry class.

use super::shape::TypeShape;
use super::{defines_class, package_dir, GeneratedHarness, HarnessGenerator, SourceFile};
use crate::submission::CodeSubmission;
use anyhow::{bail, Context, Result};
use crucible_common::types::{QuestionMetadata, QuestionType};
use serde_json::Value;
use std::collections::BTreeSet;

pub struct JavaHarnessGenerator;

impl HarnessGenerator for JavaHarnessGenerator {
    fn generate(&self, submission: &CodeSubmission) -> Result<GeneratedHarness> {
        let meta = &submission.metadata;
        if meta.package_name.trim().is_empty() {
            bail!("packageName must not be empty");
        }
        let pkg_dir = package_dir(&meta.package_name);

        let mut helpers = HelperSet::new();
        let main_source = match meta.question_type {
            QuestionType::FunctionCall => function_call_main(submission, &mut helpers)?,
            QuestionType::DesignClass => design_class_main(submission, &mut helpers)?,
        };

        let mut files = Vec::new();
        files.push(SourceFile {
            path: format!("{}/Main.java", pkg_dir),
            contents: main_source,
        });

        let user_file = match meta.question_type {
            QuestionType::FunctionCall => "Solution.java".to_string(),
            QuestionType::DesignClass => format!("{}.java", meta.function_name),
        };
        files.push(SourceFile {
            path: format!("{}/{}", pkg_dir, user_file),
            contents: prepare_user_source(&meta.package_name, &submission.source_code),
        });

        for name in required_structures(meta)? {
            if !defines_class(&submission.source_code, name) {
                files.push(SourceFile {
                    path: format!("{}/{}.java", pkg_dir, name),
                    contents: structure_class(name, &meta.package_name),
                });
            }
        }

        Ok(GeneratedHarness {
            files,
            package_dir: pkg_dir,
            entry_point: format!("{}.Main", meta.package_name),
        })
    }
}

/// Data structures the harness must provide: the declared set plus any
/// shape referenced by the signature.
fn required_structures(meta: &QuestionMetadata) -> Result<Vec<&'static str>> {
    let mut names: BTreeSet<&'static str> = BTreeSet::new();
    for declared in &meta.custom_data_structures {
        match declared.as_str() {
            "ListNode" => names.insert("ListNode"),
            "TreeNode" => names.insert("TreeNode"),
            "Node" => names.insert("Node"),
            other => bail!("unsupported custom data structure: {}", other),
        };
    }
    for param in &meta.parameters {
        if let Some(shape) = TypeShape::parse(&param.type_name) {
            if let Some(name) = shape.custom_structure() {
                names.insert(name);
            }
        }
    }
    if let Some(shape) = TypeShape::parse(&meta.return_type) {
        if let Some(name) = shape.custom_structure() {
            names.insert(name);
        }
    }
    Ok(names.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Function-call harness
// ---------------------------------------------------------------------------

fn function_call_main(submission: &CodeSubmission, helpers: &mut HelperSet) -> Result<String> {
    let meta = &submission.metadata;
    let return_shape = TypeShape::parse(&meta.return_type)
        .with_context(|| format!("unsupported return type: {}", meta.return_type))?;
    let mut params: Vec<(String, TypeShape)> = Vec::with_capacity(meta.parameters.len());
    for p in &meta.parameters {
        let shape = TypeShape::parse(&p.type_name)
            .with_context(|| format!("unsupported parameter type: {}", p.type_name))?;
        if shape == TypeShape::Void {
            bail!("void is not a valid parameter type");
        }
        params.push((p.name.clone(), shape));
    }

    helpers.require("emit");
    helpers.require("describe");

    let mut calls = String::new();
    let mut methods = String::new();
    for (i, case) in submission.cases.iter().enumerate() {
        calls.push_str(&format!("        runCase{}(solution);\n", i));
        methods.push_str(&function_case_method(i, meta, &params, &return_shape, &case.input, helpers)?);
        methods.push('\n');
    }

    Ok(format!(
        "package {pkg};\n\nimport java.util.*;\n\npublic class Main {{\n    public static void main(String[] args) {{\n        Solution solution = new Solution();\n{calls}    }}\n\n{methods}{helpers}}}\n",
        pkg = meta.package_name,
        calls = calls,
        methods = methods,
        helpers = helpers.render(),
    ))
}

fn function_case_method(
    index: usize,
    meta: &QuestionMetadata,
    params: &[(String, TypeShape)],
    return_shape: &TypeShape,
    input: &Value,
    helpers: &mut HelperSet,
) -> Result<String> {
    let object = input
        .as_object()
        .with_context(|| format!("test case {} input must be a JSON object", index))?;

    let mut decls = String::new();
    for (name, shape) in params {
        let value = object.get(name).unwrap_or(&Value::Null);
        let literal = render_value(shape, value, helpers)
            .with_context(|| format!("test case {}, parameter {}", index, name))?;
        decls.push_str(&format!(
            "            {} {} = {};\n",
            shape.java_type(),
            name,
            literal
        ));
    }
    let args = params
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (invoke, serialize) = if *return_shape == TypeShape::Void {
        let target = meta.mutation_target.unwrap_or(0);
        let (target_name, target_shape) = params
            .get(target)
            .with_context(|| format!("mutationTarget {} out of range", target))?;
        super::check_mutation_strategy(meta.serialization_strategy, target_shape)?;
        (
            format!("            solution.{}({});", meta.function_name, args),
            output_expr(target_shape, target_name, helpers)?,
        )
    } else {
        (
            format!(
                "            {} result = solution.{}({});",
                return_shape.java_type(),
                meta.function_name,
                args
            ),
            output_expr(return_shape, "result", helpers)?,
        )
    };

    Ok(format!(
        "    private static void runCase{index}(Solution solution) {{\n        long started = System.nanoTime();\n        long elapsed = 0L;\n        String output = \"\";\n        String error = \"\";\n        try {{\n{decls}            started = System.nanoTime();\n{invoke}\n            elapsed = (System.nanoTime() - started) / 1_000_000L;\n            output = {serialize};\n        }} catch (Throwable t) {{\n            elapsed = (System.nanoTime() - started) / 1_000_000L;\n            error = describe(t);\n        }}\n        emit({index}, output, elapsed, error);\n    }}\n",
        index = index,
        decls = decls,
        invoke = invoke,
        serialize = serialize,
    ))
}

// ---------------------------------------------------------------------------
// Design-class harness
// ---------------------------------------------------------------------------

fn design_class_main(submission: &CodeSubmission, helpers: &mut HelperSet) -> Result<String> {
    let meta = &submission.metadata;
    let class_name = meta.function_name.trim();
    if class_name.is_empty() {
        bail!("design-class questions require a class name in functionName");
    }

    helpers.require("emit");
    helpers.require("describe");
    helpers.require("unwrap");
    helpers.require("quote");
    helpers.require("intArrayToJson");
    helpers.require("stringArrayToJson");
    helpers.require("listToJson");

    let structures = required_structures(meta)?;
    for name in &structures {
        match *name {
            "ListNode" => helpers.require("listNodeSupport"),
            "TreeNode" => helpers.require("treeNodeSupport"),
            "Node" => helpers.require("nodeSupport"),
            _ => {}
        }
    }
    helpers.set_dynamic_blocks(object_to_json_block(&structures), reflection_block(&structures));

    let mut calls = String::new();
    let mut methods = String::new();
    for (i, case) in submission.cases.iter().enumerate() {
        calls.push_str(&format!("        runCase{}();\n", i));
        methods.push_str(&design_case_method(i, class_name, &case.input)?);
        methods.push('\n');
    }

    Ok(format!(
        "package {pkg};\n\nimport java.lang.reflect.*;\nimport java.util.*;\n\npublic class Main {{\n    public static void main(String[] args) {{\n{calls}    }}\n\n{methods}{helpers}}}\n",
        pkg = meta.package_name,
        calls = calls,
        methods = methods,
        helpers = helpers.render(),
    ))
}

fn design_case_method(index: usize, class_name: &str, input: &Value) -> Result<String> {
    let pair = input
        .as_array()
        .filter(|a| a.len() == 2)
        .with_context(|| format!("design test case {} must be [opNames, opArgs]", index))?;
    let op_names = pair[0]
        .as_array()
        .with_context(|| format!("design test case {}: opNames must be an array", index))?;
    let op_args = pair[1]
        .as_array()
        .with_context(|| format!("design test case {}: opArgs must be an array", index))?;
    if op_names.len() != op_args.len() {
        bail!(
            "design test case {}: opNames and opArgs lengths differ ({} vs {})",
            index,
            op_names.len(),
            op_args.len()
        );
    }
    if op_names.is_empty() {
        bail!("design test case {}: operation list is empty", index);
    }

    let ops = op_names
        .iter()
        .map(|op| {
            op.as_str()
                .map(java_string_literal)
                .context("operation names must be strings")
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut arg_rows = Vec::with_capacity(op_args.len());
    for (i, args) in op_args.iter().enumerate() {
        let list = args
            .as_array()
            .with_context(|| format!("design test case {}: opArgs[{}] must be an array", index, i))?;
        let rendered = list
            .iter()
            .map(render_object)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("design test case {}: opArgs[{}]", index, i))?;
        arg_rows.push(format!("new Object[]{{{}}}", rendered.join(", ")));
    }
    let arg_lists = arg_rows.join(",\n                ");

    Ok(format!(
        "    private static void runCase{index}() {{\n        long started = System.nanoTime();\n        long elapsed = 0L;\n        String output = \"\";\n        String error = \"\";\n        try {{\n            String[] ops = new String[]{{{ops}}};\n            Object[][] argLists = new Object[][]{{\n                {arg_lists}\n            }};\n            started = System.nanoTime();\n            List<Object> results = runOperations({class_name}.class, ops, argLists);\n            elapsed = (System.nanoTime() - started) / 1_000_000L;\n            output = objectToJson(results);\n        }} catch (Throwable t) {{\n            elapsed = (System.nanoTime() - started) / 1_000_000L;\n            error = describe(unwrap(t));\n        }}\n        emit({index}, output, elapsed, error);\n    }}\n",
        index = index,
        ops = ops,
        arg_lists = arg_lists,
        class_name = class_name,
    ))
}

// ---------------------------------------------------------------------------
// Literal rendering
// ---------------------------------------------------------------------------

/// Render an input JSON value as a Java expression of the declared shape.
fn render_value(shape: &TypeShape, value: &Value, helpers: &mut HelperSet) -> Result<String> {
    if value.is_null() {
        return match shape {
            TypeShape::Int
            | TypeShape::Long
            | TypeShape::Double
            | TypeShape::Float
            | TypeShape::Boolean
            | TypeShape::Char => bail!("null is not valid for primitive {}", shape),
            _ => Ok("null".to_string()),
        };
    }
    match shape {
        TypeShape::Int => {
            let n = as_integer(value).with_context(|| format!("expected int, got {}", value))?;
            Ok(n.to_string())
        }
        TypeShape::Long => {
            let n = as_integer(value).with_context(|| format!("expected long, got {}", value))?;
            Ok(format!("{}L", n))
        }
        TypeShape::Double => {
            let n = value
                .as_f64()
                .with_context(|| format!("expected double, got {}", value))?;
            Ok(format_double(n))
        }
        TypeShape::Float => {
            let n = value
                .as_f64()
                .with_context(|| format!("expected float, got {}", value))?;
            Ok(format!("{}f", format_double(n)))
        }
        TypeShape::Boolean => {
            let b = value
                .as_bool()
                .with_context(|| format!("expected boolean, got {}", value))?;
            Ok(b.to_string())
        }
        TypeShape::Char => {
            let s = value
                .as_str()
                .filter(|s| s.chars().count() == 1)
                .with_context(|| format!("expected single-character string, got {}", value))?;
            Ok(java_char_literal(s.chars().next().unwrap()))
        }
        TypeShape::Str => {
            let s = value
                .as_str()
                .with_context(|| format!("expected string, got {}", value))?;
            Ok(java_string_literal(s))
        }
        TypeShape::Array(inner) => {
            let items = value
                .as_array()
                .with_context(|| format!("expected array for {}", shape))?;
            let rendered = items
                .iter()
                .map(|item| render_value(inner, item, helpers))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("new {}{{{}}}", shape.java_type(), rendered.join(", ")))
        }
        TypeShape::List(inner) => {
            let items = value
                .as_array()
                .with_context(|| format!("expected array for {}", shape))?;
            if items.is_empty() {
                return Ok(format!("new ArrayList<{}>()", inner.java_boxed()));
            }
            let rendered = items
                .iter()
                .map(|item| render_value(inner, item, helpers))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("new ArrayList<>(Arrays.asList({}))", rendered.join(", ")))
        }
        TypeShape::ListNode => {
            helpers.require("listNodeSupport");
            Ok(format!("buildListNode({})", json_argument(value)?))
        }
        TypeShape::TreeNode => {
            helpers.require("treeNodeSupport");
            Ok(format!("buildTreeNode({})", json_argument(value)?))
        }
        TypeShape::GraphNode => {
            helpers.require("nodeSupport");
            Ok(format!("buildNode({})", json_argument(value)?))
        }
        TypeShape::Void => bail!("void cannot be decoded"),
    }
}

/// Render a design-class argument as an `Object` expression. The declared
/// parameter types are unknown here, so arrays always render as Lists;
/// coerceArg turns a List into a primitive array or a custom structure at
/// call time, once the candidate parameter type is in hand.
fn render_object(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(format!("Boolean.valueOf({})", b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    Ok(format!("Integer.valueOf({})", i))
                } else {
                    Ok(format!("Long.valueOf({}L)", i))
                }
            } else {
                Ok(format!(
                    "Double.valueOf({})",
                    format_double(n.as_f64().context("unrepresentable number")?)
                ))
            }
        }
        Value::String(s) => Ok(java_string_literal(s)),
        Value::Array(items) => {
            let rendered = items.iter().map(render_object).collect::<Result<Vec<_>>>()?;
            Ok(format!("Arrays.asList({})", rendered.join(", ")))
        }
        Value::Object(_) => bail!("object-valued arguments are not supported"),
    }
}

/// Serialization expression for a value of the given shape.
fn output_expr(shape: &TypeShape, var: &str, helpers: &mut HelperSet) -> Result<String> {
    match shape {
        TypeShape::Int
        | TypeShape::Long
        | TypeShape::Double
        | TypeShape::Float
        | TypeShape::Boolean
        | TypeShape::Char => Ok(format!("String.valueOf({})", var)),
        TypeShape::Str => {
            helpers.require("quote");
            Ok(format!("quote({})", var))
        }
        TypeShape::Array(inner) => match inner.as_ref() {
            TypeShape::Int => helper_call(helpers, "intArrayToJson", var),
            TypeShape::Long => helper_call(helpers, "longArrayToJson", var),
            TypeShape::Double => helper_call(helpers, "doubleArrayToJson", var),
            TypeShape::Float => helper_call(helpers, "floatArrayToJson", var),
            TypeShape::Boolean => helper_call(helpers, "booleanArrayToJson", var),
            TypeShape::Char => helper_call(helpers, "charArrayToJson", var),
            TypeShape::Str => helper_call(helpers, "stringArrayToJson", var),
            TypeShape::Array(scalar) => match scalar.as_ref() {
                TypeShape::Int => helper_call(helpers, "int2dToJson", var),
                TypeShape::Char => helper_call(helpers, "char2dToJson", var),
                TypeShape::Str => helper_call(helpers, "string2dToJson", var),
                other => bail!("unsupported nested array of {}", other),
            },
            TypeShape::ListNode => helper_call(helpers, "convertListNodeListToJson", var),
            TypeShape::TreeNode => helper_call(helpers, "convertTreeNodeListToJson", var),
            other => bail!("unsupported array of {}", other),
        },
        TypeShape::List(inner) => match inner.as_ref() {
            TypeShape::ListNode => helper_call(helpers, "convertListNodeListToJson", var),
            TypeShape::TreeNode => helper_call(helpers, "convertTreeNodeListToJson", var),
            TypeShape::GraphNode => bail!("unsupported list of graph nodes"),
            _ => helper_call(helpers, "listToJson", var),
        },
        TypeShape::ListNode => helper_call(helpers, "convertListNodeToJson", var),
        TypeShape::TreeNode => helper_call(helpers, "convertTreeNodeToJson", var),
        TypeShape::GraphNode => helper_call(helpers, "convertNodeToJson", var),
        TypeShape::Void => bail!("void has no serialized form"),
    }
}

fn helper_call(helpers: &mut HelperSet, name: &'static str, var: &str) -> Result<String> {
    let key = match name {
        "convertListNodeToJson" => "listNodeSupport",
        "convertTreeNodeToJson" => "treeNodeSupport",
        "convertNodeToJson" => "nodeSupport",
        other => other,
    };
    helpers.require(key);
    Ok(format!("{}({})", name, var))
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

fn format_double(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

fn java_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn java_char_literal(c: char) -> String {
    match c {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\t' => "'\\t'".to_string(),
        c => format!("'{}'", c),
    }
}

/// Compact JSON text of a value, as a Java string literal.
fn json_argument(value: &Value) -> Result<String> {
    if !value.is_array() {
        bail!("expected a JSON array, got {}", value);
    }
    Ok(java_string_literal(&value.to_string()))
}

// ---------------------------------------------------------------------------
// User source preparation
// ---------------------------------------------------------------------------

/// Prepend the package declaration and hoist user imports above the class
/// body, adding `java.util.*` so the common containers are always there.
fn prepare_user_source(package_name: &str, source: &str) -> String {
    let mut imports: Vec<String> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("package ") {
            continue;
        }
        if trimmed.starts_with("import ") {
            if !imports.iter().any(|existing| existing == trimmed) {
                imports.push(trimmed.to_string());
            }
            continue;
        }
        body.push(line);
    }
    let util = "import java.util.*;";
    if !imports.iter().any(|i| i == util) {
        imports.insert(0, util.to_string());
    }
    format!(
        "package {};\n\n{}\n\n{}\n",
        package_name,
        imports.join("\n"),
        body.join("\n").trim_matches('\n')
    )
}

fn structure_class(name: &str, package_name: &str) -> String {
    let body = match name {
        "ListNode" => LISTNODE_CLASS,
        "TreeNode" => TREENODE_CLASS,
        "Node" => NODE_CLASS,
        _ => unreachable!("validated earlier"),
    };
    format!("package {};\n\n{}", package_name, body)
}

const LISTNODE_CLASS: &str = "public class ListNode {
    public int val;
    public ListNode next;

    public ListNode() {
    }

    public ListNode(int val) {
        this.val = val;
    }

    public ListNode(int val, ListNode next) {
        this.val = val;
        this.next = next;
    }
}
";

const TREENODE_CLASS: &str = "public class TreeNode {
    public int val;
    public TreeNode left;
    public TreeNode right;

    public TreeNode() {
    }

    public TreeNode(int val) {
        this.val = val;
    }

    public TreeNode(int val, TreeNode left, TreeNode right) {
        this.val = val;
        this.left = left;
        this.right = right;
    }
}
";

const NODE_CLASS: &str = "import java.util.ArrayList;
import java.util.List;

public class Node {
    public int val;
    public List<Node> neighbors;

    public Node() {
        this.neighbors = new ArrayList<>();
    }

    public Node(int val) {
        this.val = val;
        this.neighbors = new ArrayList<>();
    }

    public Node(int val, ArrayList<Node> neighbors) {
        this.val = val;
        this.neighbors = neighbors;
    }
}
";

// ---------------------------------------------------------------------------
// Helper library
// ---------------------------------------------------------------------------

/// Static helper methods emitted into Main, resolved transitively and in a
/// fixed order so the generated file is deterministic.
struct HelperSet {
    keys: BTreeSet<&'static str>,
    object_to_json: Option<String>,
    reflection: Option<String>,
}

impl HelperSet {
    fn new() -> Self {
        HelperSet {
            keys: BTreeSet::new(),
            object_to_json: None,
            reflection: None,
        }
    }

    fn require(&mut self, key: &'static str) {
        if self.keys.insert(key) {
            for dep in helper_deps(key) {
                self.require(*dep);
            }
        }
    }

    fn set_dynamic_blocks(&mut self, object_to_json: String, reflection: String) {
        self.object_to_json = Some(object_to_json);
        self.reflection = Some(reflection);
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for key in HELPER_ORDER {
            if self.keys.contains(key) {
                out.push_str(helper_block(key));
                out.push('\n');
            }
        }
        if let Some(block) = &self.object_to_json {
            out.push_str(block);
            out.push('\n');
        }
        if let Some(block) = &self.reflection {
            out.push_str(block);
            out.push('\n');
        }
        // drop the trailing blank line before the closing brace
        if out.ends_with('\n') {
            out.pop();
        }
        out
    }
}

const HELPER_ORDER: &[&str] = &[
    "emit",
    "describe",
    "unwrap",
    "quote",
    "intArrayToJson",
    "longArrayToJson",
    "doubleArrayToJson",
    "floatArrayToJson",
    "booleanArrayToJson",
    "charArrayToJson",
    "stringArrayToJson",
    "int2dToJson",
    "char2dToJson",
    "string2dToJson",
    "listToJson",
    "splitJsonArray",
    "listNodeSupport",
    "convertListNodeListToJson",
    "treeNodeSupport",
    "convertTreeNodeListToJson",
    "nodeSupport",
];

fn helper_deps(key: &str) -> &'static [&'static str] {
    match key {
        "charArrayToJson" | "stringArrayToJson" | "listToJson" => &["quote"],
        "int2dToJson" => &["intArrayToJson"],
        "char2dToJson" => &["charArrayToJson"],
        "string2dToJson" => &["stringArrayToJson"],
        "listNodeSupport" | "treeNodeSupport" | "nodeSupport" => &["splitJsonArray"],
        "convertListNodeListToJson" => &["listNodeSupport"],
        "convertTreeNodeListToJson" => &["treeNodeSupport"],
        _ => &[],
    }
}

fn helper_block(key: &str) -> &'static str {
    match key {
        "emit" => {
            "    private static void emit(int index, String output, long durationMs, String error) {
        System.out.println(\"TEST_CASE_RESULT: \" + index + \",\" + output + \",\" + durationMs + \",\" + error);
    }
"
        }
        "describe" => {
            // newlines would break the line protocol and commas its
            // last-two-commas tokenization, so both are squashed
            "    private static String describe(Throwable t) {
        String name = t.getClass().getSimpleName();
        String message = t.getMessage();
        if (message == null || message.isEmpty()) {
            return name;
        }
        message = message.replace('\\n', ' ').replace('\\r', ' ').replace(',', ';');
        return name + \": \" + message;
    }
"
        }
        "unwrap" => {
            "    private static Throwable unwrap(Throwable t) {
        if (t instanceof InvocationTargetException && t.getCause() != null) {
            return t.getCause();
        }
        return t;
    }
"
        }
        "quote" => {
            "    private static String quote(String value) {
        if (value == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"\\\"\");
        for (int i = 0; i < value.length(); i++) {
            char c = value.charAt(i);
            switch (c) {
                case '\"': sb.append(\"\\\\\\\"\"); break;
                case '\\\\': sb.append(\"\\\\\\\\\"); break;
                case '\\n': sb.append(\"\\\\n\"); break;
                case '\\r': sb.append(\"\\\\r\"); break;
                case '\\t': sb.append(\"\\\\t\"); break;
                default: sb.append(c);
            }
        }
        return sb.append('\\\"').toString();
    }
"
        }
        "intArrayToJson" => {
            "    private static String intArrayToJson(int[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(values[i]);
        }
        return sb.append(']').toString();
    }
"
        }
        "longArrayToJson" => {
            "    private static String longArrayToJson(long[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(values[i]);
        }
        return sb.append(']').toString();
    }
"
        }
        "doubleArrayToJson" => {
            "    private static String doubleArrayToJson(double[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(values[i]);
        }
        return sb.append(']').toString();
    }
"
        }
        "floatArrayToJson" => {
            "    private static String floatArrayToJson(float[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(values[i]);
        }
        return sb.append(']').toString();
    }
"
        }
        "booleanArrayToJson" => {
            "    private static String booleanArrayToJson(boolean[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(values[i]);
        }
        return sb.append(']').toString();
    }
"
        }
        "charArrayToJson" => {
            "    private static String charArrayToJson(char[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(quote(String.valueOf(values[i])));
        }
        return sb.append(']').toString();
    }
"
        }
        "stringArrayToJson" => {
            "    private static String stringArrayToJson(String[] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(quote(values[i]));
        }
        return sb.append(']').toString();
    }
"
        }
        "int2dToJson" => {
            "    private static String int2dToJson(int[][] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(intArrayToJson(values[i]));
        }
        return sb.append(']').toString();
    }
"
        }
        "char2dToJson" => {
            "    private static String char2dToJson(char[][] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(charArrayToJson(values[i]));
        }
        return sb.append(']').toString();
    }
"
        }
        "string2dToJson" => {
            "    private static String string2dToJson(String[][] values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(stringArrayToJson(values[i]));
        }
        return sb.append(']').toString();
    }
"
        }
        "listToJson" => {
            "    private static String listToJson(List<?> values) {
        if (values == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < values.size(); i++) {
            if (i > 0) {
                sb.append(',');
            }
            Object v = values.get(i);
            if (v == null) {
                sb.append(\"null\");
            } else if (v instanceof List) {
                sb.append(listToJson((List<?>) v));
            } else if (v instanceof String) {
                sb.append(quote((String) v));
            } else if (v instanceof Character) {
                sb.append(quote(String.valueOf(v)));
            } else {
                sb.append(v);
            }
        }
        return sb.append(']').toString();
    }
"
        }
        "splitJsonArray" => {
            "    private static List<String> splitJsonArray(String json) {
        List<String> tokens = new ArrayList<>();
        String body = json.trim();
        if (body.startsWith(\"[\")) {
            body = body.substring(1, body.length() - 1);
        }
        int depth = 0;
        StringBuilder current = new StringBuilder();
        for (int i = 0; i < body.length(); i++) {
            char c = body.charAt(i);
            if (c == '[') {
                depth++;
            } else if (c == ']') {
                depth--;
            }
            if (c == ',' && depth == 0) {
                addToken(tokens, current);
                current = new StringBuilder();
            } else {
                current.append(c);
            }
        }
        addToken(tokens, current);
        return tokens;
    }

    private static void addToken(List<String> tokens, StringBuilder sb) {
        String token = sb.toString().trim();
        if (!token.isEmpty()) {
            tokens.add(token);
        }
    }
"
        }
        "listNodeSupport" => {
            "    private static ListNode buildListNode(String json) {
        ListNode head = null;
        ListNode tail = null;
        for (String token : splitJsonArray(json)) {
            if (token.equals(\"null\")) {
                continue;
            }
            ListNode node = new ListNode(Integer.parseInt(token));
            if (head == null) {
                head = node;
            } else {
                tail.next = node;
            }
            tail = node;
        }
        return head;
    }

    private static String convertListNodeToJson(ListNode head) {
        StringBuilder sb = new StringBuilder(\"[\");
        ListNode node = head;
        while (node != null) {
            if (sb.length() > 1) {
                sb.append(',');
            }
            sb.append(node.val);
            node = node.next;
        }
        return sb.append(']').toString();
    }
"
        }
        "convertListNodeListToJson" => {
            "    private static String convertListNodeListToJson(ListNode[] nodes) {
        if (nodes == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < nodes.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(convertListNodeToJson(nodes[i]));
        }
        return sb.append(']').toString();
    }

    private static String convertListNodeListToJson(List<ListNode> nodes) {
        if (nodes == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < nodes.size(); i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(convertListNodeToJson(nodes.get(i)));
        }
        return sb.append(']').toString();
    }
"
        }
        "treeNodeSupport" => {
            "    private static TreeNode buildTreeNode(String json) {
        List<String> tokens = splitJsonArray(json);
        if (tokens.isEmpty() || tokens.get(0).equals(\"null\")) {
            return null;
        }
        TreeNode root = new TreeNode(Integer.parseInt(tokens.get(0)));
        LinkedList<TreeNode> queue = new LinkedList<>();
        queue.add(root);
        int i = 1;
        while (!queue.isEmpty() && i < tokens.size()) {
            TreeNode node = queue.poll();
            String left = tokens.get(i++);
            if (!left.equals(\"null\")) {
                node.left = new TreeNode(Integer.parseInt(left));
                queue.add(node.left);
            }
            if (i < tokens.size()) {
                String right = tokens.get(i++);
                if (!right.equals(\"null\")) {
                    node.right = new TreeNode(Integer.parseInt(right));
                    queue.add(node.right);
                }
            }
        }
        return root;
    }

    private static String convertTreeNodeToJson(TreeNode root) {
        if (root == null) {
            return \"[]\";
        }
        List<String> out = new ArrayList<>();
        LinkedList<TreeNode> queue = new LinkedList<>();
        queue.add(root);
        while (!queue.isEmpty()) {
            TreeNode node = queue.poll();
            if (node == null) {
                out.add(\"null\");
                continue;
            }
            out.add(String.valueOf(node.val));
            queue.add(node.left);
            queue.add(node.right);
        }
        while (!out.isEmpty() && out.get(out.size() - 1).equals(\"null\")) {
            out.remove(out.size() - 1);
        }
        return \"[\" + String.join(\",\", out) + \"]\";
    }
"
        }
        "convertTreeNodeListToJson" => {
            "    private static String convertTreeNodeListToJson(TreeNode[] nodes) {
        if (nodes == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < nodes.length; i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(convertTreeNodeToJson(nodes[i]));
        }
        return sb.append(']').toString();
    }

    private static String convertTreeNodeListToJson(List<TreeNode> nodes) {
        if (nodes == null) {
            return \"null\";
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 0; i < nodes.size(); i++) {
            if (i > 0) {
                sb.append(',');
            }
            sb.append(convertTreeNodeToJson(nodes.get(i)));
        }
        return sb.append(']').toString();
    }
"
        }
        "nodeSupport" => {
            "    private static Node buildNode(String json) {
        List<String> tokens = splitJsonArray(json);
        if (tokens.isEmpty()) {
            return null;
        }
        Map<Integer, Node> nodes = new HashMap<>();
        for (int i = 1; i <= tokens.size(); i++) {
            nodes.put(i, new Node(i));
        }
        for (int i = 0; i < tokens.size(); i++) {
            Node node = nodes.get(i + 1);
            for (String label : splitJsonArray(tokens.get(i))) {
                int v = Integer.parseInt(label);
                Node neighbor = nodes.get(v);
                if (neighbor == null) {
                    neighbor = new Node(v);
                    nodes.put(v, neighbor);
                }
                node.neighbors.add(neighbor);
            }
        }
        return nodes.get(1);
    }

    private static String convertNodeToJson(Node start) {
        if (start == null) {
            return \"[]\";
        }
        Map<Integer, List<Integer>> adjacency = new HashMap<>();
        LinkedList<Node> queue = new LinkedList<>();
        Set<Integer> visited = new HashSet<>();
        queue.add(start);
        visited.add(start.val);
        int maxLabel = start.val;
        while (!queue.isEmpty()) {
            Node node = queue.poll();
            maxLabel = Math.max(maxLabel, node.val);
            List<Integer> labels = new ArrayList<>();
            for (Node neighbor : node.neighbors) {
                labels.add(neighbor.val);
                if (visited.add(neighbor.val)) {
                    queue.add(neighbor);
                }
            }
            adjacency.put(node.val, labels);
        }
        StringBuilder sb = new StringBuilder(\"[\");
        for (int i = 1; i <= maxLabel; i++) {
            if (i > 1) {
                sb.append(',');
            }
            sb.append('[');
            List<Integer> labels = adjacency.get(i);
            if (labels != null) {
                for (int j = 0; j < labels.size(); j++) {
                    if (j > 0) {
                        sb.append(',');
                    }
                    sb.append(labels.get(j));
                }
            }
            sb.append(']');
        }
        return sb.append(']').toString();
    }
"
        }
        _ => unreachable!("unknown helper key"),
    }
}

/// `objectToJson` for design-class results; branches for custom structures
/// are only present when the structures themselves are.
fn object_to_json_block(structures: &[&'static str]) -> String {
    let mut ds_branches = String::new();
    for name in structures {
        let convert = match *name {
            "ListNode" => "convertListNodeToJson",
            "TreeNode" => "convertTreeNodeToJson",
            "Node" => "convertNodeToJson",
            _ => continue,
        };
        ds_branches.push_str(&format!(
            "        if (value instanceof {name}) {{\n            return {convert}(({name}) value);\n        }}\n",
            name = name,
            convert = convert,
        ));
    }
    format!(
        "    private static String objectToJson(Object value) {{
        if (value == null) {{
            return \"null\";
        }}
        if (value instanceof String) {{
            return quote((String) value);
        }}
        if (value instanceof Character) {{
            return quote(String.valueOf(value));
        }}
        if (value instanceof List) {{
            StringBuilder sb = new StringBuilder(\"[\");
            List<?> list = (List<?>) value;
            for (int i = 0; i < list.size(); i++) {{
                if (i > 0) {{
                    sb.append(',');
                }}
                sb.append(objectToJson(list.get(i)));
            }}
            return sb.append(']').toString();
        }}
        if (value instanceof int[]) {{
            return intArrayToJson((int[]) value);
        }}
        if (value instanceof String[]) {{
            return stringArrayToJson((String[]) value);
        }}
{ds_branches}        return String.valueOf(value);
    }}
",
        ds_branches = ds_branches,
    )
}

/// Arity-based constructor/method selection with null-versus-primitive
/// elimination and a small coercion table.
fn reflection_block(structures: &[&'static str]) -> String {
    let mut ds_branches = String::new();
    for name in structures {
        let build = match *name {
            "ListNode" => "buildListNode",
            "TreeNode" => "buildTreeNode",
            "Node" => "buildNode",
            _ => continue,
        };
        ds_branches.push_str(&format!(
            "        if (type.getSimpleName().equals(\"{name}\") && arg instanceof List) {{\n            return {build}(listToJson((List<?>) arg));\n        }}\n",
            name = name,
            build = build,
        ));
    }
    format!(
        "    private static final Object INCOMPATIBLE = new Object();

    private static List<Object> runOperations(Class<?> cls, String[] ops, Object[][] argLists) throws Exception {{
        List<Object> results = new ArrayList<>();
        Object instance = construct(cls, argLists[0]);
        results.add(null);
        for (int i = 1; i < ops.length; i++) {{
            Object[] args = argLists[i];
            for (int j = 0; j < args.length; j++) {{
                if (\"$PREV\".equals(args[j])) {{
                    args[j] = results.get(results.size() - 1);
                }}
            }}
            results.add(call(instance, ops[i], args));
        }}
        return results;
    }}

    private static Object construct(Class<?> cls, Object[] args) throws Exception {{
        for (Constructor<?> candidate : cls.getConstructors()) {{
            Object[] coerced = coerceAll(candidate.getParameterTypes(), args);
            if (coerced != null) {{
                return candidate.newInstance(coerced);
            }}
        }}
        throw new NoSuchMethodException(cls.getSimpleName() + \" has no constructor of arity \" + args.length);
    }}

    private static Object call(Object instance, String name, Object[] args) throws Exception {{
        for (Method candidate : instance.getClass().getMethods()) {{
            if (!candidate.getName().equals(name)) {{
                continue;
            }}
            Object[] coerced = coerceAll(candidate.getParameterTypes(), args);
            if (coerced != null) {{
                Object value = candidate.invoke(instance, coerced);
                return candidate.getReturnType() == void.class ? null : value;
            }}
        }}
        throw new NoSuchMethodException(instance.getClass().getSimpleName() + \".\" + name + \" with arity \" + args.length);
    }}

    private static Object[] coerceAll(Class<?>[] types, Object[] args) {{
        if (types.length != args.length) {{
            return null;
        }}
        Object[] out = new Object[args.length];
        for (int i = 0; i < args.length; i++) {{
            Object coerced = coerceArg(types[i], args[i]);
            if (coerced == INCOMPATIBLE) {{
                return null;
            }}
            out[i] = coerced;
        }}
        return out;
    }}

    private static Object coerceArg(Class<?> type, Object arg) {{
        if (arg == null) {{
            return type.isPrimitive() ? INCOMPATIBLE : null;
        }}
        if (type.isInstance(arg)) {{
            return arg;
        }}
        if ((type == int.class || type == Integer.class) && arg instanceof Number) {{
            return ((Number) arg).intValue();
        }}
        if ((type == long.class || type == Long.class) && arg instanceof Number) {{
            return ((Number) arg).longValue();
        }}
        if ((type == double.class || type == Double.class) && arg instanceof Number) {{
            return ((Number) arg).doubleValue();
        }}
        if ((type == float.class || type == Float.class) && arg instanceof Number) {{
            return ((Number) arg).floatValue();
        }}
        if ((type == boolean.class || type == Boolean.class) && arg instanceof Boolean) {{
            return arg;
        }}
        if ((type == char.class || type == Character.class) && arg instanceof String && ((String) arg).length() == 1) {{
            return ((String) arg).charAt(0);
        }}
        if (type == int[].class && arg instanceof List) {{
            List<?> list = (List<?>) arg;
            int[] out = new int[list.size()];
            for (int i = 0; i < out.length; i++) {{
                out[i] = ((Number) list.get(i)).intValue();
            }}
            return out;
        }}
        if (type == String[].class && arg instanceof List) {{
            List<?> list = (List<?>) arg;
            String[] out = new String[list.size()];
            for (int i = 0; i < out.length; i++) {{
                out[i] = (String) list.get(i);
            }}
            return out;
        }}
        if (type == int[][].class && arg instanceof List) {{
            List<?> rows = (List<?>) arg;
            int[][] out = new int[rows.size()][];
            for (int i = 0; i < out.length; i++) {{
                List<?> cells = (List<?>) rows.get(i);
                int[] converted = new int[cells.size()];
                for (int j = 0; j < converted.length; j++) {{
                    converted[j] = ((Number) cells.get(j)).intValue();
                }}
                out[i] = converted;
            }}
            return out;
        }}
        if (List.class.isAssignableFrom(type) && arg instanceof int[]) {{
            List<Integer> out = new ArrayList<>();
            for (int v : (int[]) arg) {{
                out.add(v);
            }}
            return out;
        }}
{ds_branches}        return INCOMPATIBLE;
    }}
",
        ds_branches = ds_branches,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::CaseInput;
    use crucible_common::types::{Language, Parameter};
    use serde_json::json;

    fn metadata(return_type: &str, params: &[(&str, &str)]) -> QuestionMetadata {
        QuestionMetadata {
            package_name: "com.example".to_string(),
            function_name: "twoSum".to_string(),
            return_type: return_type.to_string(),
            parameters: params
                .iter()
                .map(|(name, ty)| Parameter {
                    name: name.to_string(),
                    type_name: ty.to_string(),
                })
                .collect(),
            custom_data_structures: Vec::new(),
            question_type: QuestionType::FunctionCall,
            mutation_target: None,
            serialization_strategy: None,
        }
    }

    fn submission(meta: QuestionMetadata, cases: Vec<Value>) -> CodeSubmission {
        CodeSubmission {
            id: "test".to_string(),
            language: Language::Java,
            source_code: "class Solution { }".to_string(),
            metadata: meta,
            cases: cases
                .into_iter()
                .map(|input| CaseInput {
                    input,
                    is_custom: false,
                })
                .collect(),
        }
    }

    #[test]
    fn two_sum_harness() {
        let sub = submission(
            metadata("int[]", &[("nums", "int[]"), ("target", "int")]),
            vec![json!({"nums": [2, 7, 11, 15], "target": 9})],
        );
        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        assert_eq!(harness.entry_point, "com.example.Main");
        assert_eq!(harness.package_dir, "com/example");

        let main = &harness.files[0];
        assert_eq!(main.path, "com/example/Main.java");
        assert!(main.contents.contains("package com.example;"));
        assert!(main
            .contents
            .contains("int[] nums = new int[]{2, 7, 11, 15};"));
        assert!(main.contents.contains("int target = 9;"));
        assert!(main
            .contents
            .contains("int[] result = solution.twoSum(nums, target);"));
        assert!(main.contents.contains("output = intArrayToJson(result);"));
        assert!(main.contents.contains("emit(0, output, elapsed, error);"));

        let solution = &harness.files[1];
        assert_eq!(solution.path, "com/example/Solution.java");
        assert!(solution.contents.starts_with("package com.example;"));
    }

    #[test]
    fn void_return_serializes_mutation_target() {
        let mut meta = metadata("void", &[("head", "ListNode")]);
        meta.function_name = "reorderList".to_string();
        meta.mutation_target = Some(0);
        meta.custom_data_structures = vec!["ListNode".to_string()];
        let sub = submission(meta, vec![json!({"head": [1, 2, 3, 4]})]);

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains("ListNode head = buildListNode(\"[1,2,3,4]\");"));
        assert!(main.contains("solution.reorderList(head);"));
        assert!(main.contains("output = convertListNodeToJson(head);"));
        // no `result` variable for a void call
        assert!(!main.contains("void result"));
        // harness supplies the class the user did not define
        assert!(harness
            .files
            .iter()
            .any(|f| f.path == "com/example/ListNode.java"));
    }

    #[test]
    fn user_defined_structure_is_not_duplicated() {
        let mut meta = metadata("ListNode", &[("head", "ListNode")]);
        meta.custom_data_structures = vec!["ListNode".to_string()];
        let mut sub = submission(meta, vec![json!({"head": [1]})]);
        sub.source_code = "class Solution {\n  class ListNode { int val; ListNode next; }\n}".to_string();

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        assert!(!harness
            .files
            .iter()
            .any(|f| f.path == "com/example/ListNode.java"));
    }

    #[test]
    fn design_class_harness() {
        let mut meta = metadata("void", &[]);
        meta.function_name = "LRUCache".to_string();
        meta.question_type = QuestionType::DesignClass;
        let sub = submission(
            meta,
            vec![json!([
                ["LRUCache", "put", "put", "get", "get"],
                [[2], [1, 1], [2, 2], [1], [2]]
            ])],
        );

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains("import java.lang.reflect.*;"));
        assert!(main.contains(
            "String[] ops = new String[]{\"LRUCache\", \"put\", \"put\", \"get\", \"get\"};"
        ));
        assert!(main.contains("runOperations(LRUCache.class, ops, argLists);"));
        assert!(main.contains("output = objectToJson(results);"));
        assert!(main.contains("\"$PREV\".equals(args[j])"));

        let user = &harness.files[1];
        assert_eq!(user.path, "com/example/LRUCache.java");
    }

    #[test]
    fn renders_scalar_literals() {
        let mut helpers = HelperSet::new();
        assert_eq!(render_value(&TypeShape::Int, &json!(9), &mut helpers).unwrap(), "9");
        assert_eq!(
            render_value(&TypeShape::Long, &json!(7), &mut helpers).unwrap(),
            "7L"
        );
        assert_eq!(
            render_value(&TypeShape::Double, &json!(2.0), &mut helpers).unwrap(),
            "2.0"
        );
        assert_eq!(
            render_value(&TypeShape::Double, &json!(2.5), &mut helpers).unwrap(),
            "2.5"
        );
        assert_eq!(
            render_value(&TypeShape::Boolean, &json!(true), &mut helpers).unwrap(),
            "true"
        );
        assert_eq!(
            render_value(&TypeShape::Char, &json!("a"), &mut helpers).unwrap(),
            "'a'"
        );
        assert_eq!(
            render_value(&TypeShape::Str, &json!("a\"b"), &mut helpers).unwrap(),
            "\"a\\\"b\""
        );
    }

    #[test]
    fn renders_nested_structures() {
        let mut helpers = HelperSet::new();
        assert_eq!(
            render_value(
                &TypeShape::parse("int[][]").unwrap(),
                &json!([[1, 2], [3]]),
                &mut helpers
            )
            .unwrap(),
            "new int[][]{new int[]{1, 2}, new int[]{3}}"
        );
        assert_eq!(
            render_value(
                &TypeShape::parse("List<List<Integer>>").unwrap(),
                &json!([[1], [2, 3]]),
                &mut helpers
            )
            .unwrap(),
            "new ArrayList<>(Arrays.asList(new ArrayList<>(Arrays.asList(1)), new ArrayList<>(Arrays.asList(2, 3))))"
        );
        assert_eq!(
            render_value(&TypeShape::parse("List<String>").unwrap(), &json!([]), &mut helpers)
                .unwrap(),
            "new ArrayList<String>()"
        );
    }

    #[test]
    fn rejects_type_mismatches() {
        let mut helpers = HelperSet::new();
        assert!(render_value(&TypeShape::Int, &json!("nine"), &mut helpers).is_err());
        assert!(render_value(&TypeShape::Int, &json!(null), &mut helpers).is_err());
        assert!(render_value(&TypeShape::Char, &json!("ab"), &mut helpers).is_err());
        assert!(render_value(&TypeShape::parse("int[]").unwrap(), &json!(3), &mut helpers).is_err());
    }

    #[test]
    fn design_argument_rendering() {
        assert_eq!(render_object(&json!(null)).unwrap(), "null");
        assert_eq!(render_object(&json!(2)).unwrap(), "Integer.valueOf(2)");
        assert_eq!(
            render_object(&json!(5_000_000_000_i64)).unwrap(),
            "Long.valueOf(5000000000L)"
        );
        assert_eq!(render_object(&json!("$PREV")).unwrap(), "\"$PREV\"");
        // arrays always become Lists so coerceArg can match them against
        // primitive-array, List, and custom-structure parameters alike
        assert_eq!(
            render_object(&json!([1, 2])).unwrap(),
            "Arrays.asList(Integer.valueOf(1), Integer.valueOf(2))"
        );
        assert_eq!(
            render_object(&json!(["a", "b"])).unwrap(),
            "Arrays.asList(\"a\", \"b\")"
        );
        assert_eq!(
            render_object(&json!([[1], "x"])).unwrap(),
            "Arrays.asList(Arrays.asList(Integer.valueOf(1)), \"x\")"
        );
        assert_eq!(
            render_object(&json!([7, 3, null, 20])).unwrap(),
            "Arrays.asList(Integer.valueOf(7), Integer.valueOf(3), null, Integer.valueOf(20))"
        );
        assert!(render_object(&json!({"k": 1})).is_err());
    }

    #[test]
    fn design_class_structure_argument_goes_through_coercion() {
        let mut meta = metadata("void", &[]);
        meta.function_name = "BSTIterator".to_string();
        meta.question_type = QuestionType::DesignClass;
        meta.custom_data_structures = vec!["TreeNode".to_string()];
        let sub = submission(
            meta,
            vec![json!([
                ["BSTIterator", "next", "next"],
                [[[7, 3, 15, null, null, 9, 20]], [], []]
            ])],
        );

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        // the tree argument reaches the constructor as a List...
        assert!(main.contains(
            "new Object[]{Arrays.asList(Integer.valueOf(7), Integer.valueOf(3), Integer.valueOf(15), null, null, Integer.valueOf(9), Integer.valueOf(20))}"
        ));
        // ...and coerceArg rebuilds it as a TreeNode by parameter type name
        assert!(main.contains("type.getSimpleName().equals(\"TreeNode\") && arg instanceof List"));
        assert!(main.contains("return buildTreeNode(listToJson((List<?>) arg));"));
        assert!(main.contains("private static TreeNode buildTreeNode(String json)"));
        assert!(harness
            .files
            .iter()
            .any(|f| f.path == "com/example/TreeNode.java"));
    }

    #[test]
    fn helper_dependencies_are_transitive() {
        let mut helpers = HelperSet::new();
        helpers.require("char2dToJson");
        let rendered = helpers.render();
        assert!(rendered.contains("char2dToJson"));
        assert!(rendered.contains("charArrayToJson"));
        assert!(rendered.contains("private static String quote(String value)"));
    }

    #[test]
    fn graph_node_round_trips_through_builders() {
        let mut meta = metadata("Node", &[("node", "Node")]);
        meta.function_name = "cloneGraph".to_string();
        meta.custom_data_structures = vec!["Node".to_string()];
        let sub = submission(meta, vec![json!({"node": [[2, 4], [1, 3], [2, 4], [1, 3]]})]);

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains("Node node = buildNode(\"[[2,4],[1,3],[2,4],[1,3]]\");"));
        assert!(main.contains("output = convertNodeToJson(result);"));
        assert!(main.contains("private static Node buildNode(String json)"));
        assert!(harness
            .files
            .iter()
            .any(|f| f.path == "com/example/Node.java"));
    }

    #[test]
    fn listnode_array_uses_per_element_builders() {
        let mut meta = metadata("ListNode", &[("lists", "ListNode[]")]);
        meta.function_name = "mergeKLists".to_string();
        let sub = submission(meta, vec![json!({"lists": [[1, 4, 5], [1, 3, 4], [2, 6]]})]);

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains(
            "ListNode[] lists = new ListNode[]{buildListNode(\"[1,4,5]\"), buildListNode(\"[1,3,4]\"), buildListNode(\"[2,6]\")};"
        ));
        assert!(main.contains("output = convertListNodeToJson(result);"));
    }

    #[test]
    fn char_matrix_decodes_and_encodes() {
        let sub = submission(
            metadata("char[][]", &[("board", "char[][]")]),
            vec![json!({"board": [["a", "b"], ["c", "d"]]})],
        );
        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains(
            "char[][] board = new char[][]{new char[]{'a', 'b'}, new char[]{'c', 'd'}};"
        ));
        assert!(main.contains("output = char2dToJson(result);"));
        assert!(main.contains("private static String char2dToJson(char[][] values)"));
    }

    #[test]
    fn tree_list_return_uses_list_converter() {
        let mut meta = metadata("List<TreeNode>", &[("root", "TreeNode")]);
        meta.function_name = "delNodes".to_string();
        let sub = submission(meta, vec![json!({"root": [1, 2, 3]})]);

        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        let main = &harness.files[0].contents;
        assert!(main.contains("TreeNode root = buildTreeNode(\"[1,2,3]\");"));
        assert!(main.contains("output = convertTreeNodeListToJson(result);"));
        assert!(main.contains("convertTreeNodeListToJson(List<TreeNode> nodes)"));
    }

    #[test]
    fn null_string_parameter_renders_null() {
        let sub = submission(
            metadata("String", &[("s", "String")]),
            vec![json!({ "s": null })],
        );
        let harness = JavaHarnessGenerator.generate(&sub).unwrap();
        assert!(harness.files[0].contents.contains("String s = null;"));
    }

    #[test]
    fn import_hoisting_deduplicates_and_adds_util() {
        let source = "package old.pkg;\nimport java.util.*;\nimport java.util.stream.*;\nclass Solution { }";
        let prepared = prepare_user_source("com.example", source);
        assert!(prepared.starts_with("package com.example;"));
        let util_count = prepared.matches("import java.util.*;").count();
        assert_eq!(util_count, 1);
        assert!(prepared.contains("import java.util.stream.*;"));
        assert!(!prepared.contains("old.pkg"));
    }
}
