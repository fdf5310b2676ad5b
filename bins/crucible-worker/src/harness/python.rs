//! Python harness generation. The generated `main.py` sits next to the
//! user's module inside the package directory and emits the same
//! `TEST_CASE_RESULT:` lines as the Java harness.

use super::shape::TypeShape;
use super::{package_dir, GeneratedHarness, HarnessGenerator, SourceFile};
use crate::submission::CodeSubmission;
use anyhow::{bail, Context, Result};
use crucible_common::types::{QuestionMetadata, QuestionType};
use serde_json::Value;
use std::collections::BTreeSet;

pub struct PythonHarnessGenerator;

impl HarnessGenerator for PythonHarnessGenerator {
    fn generate(&self, submission: &CodeSubmission) -> Result<GeneratedHarness> {
        let meta = &submission.metadata;
        if meta.package_name.trim().is_empty() {
            bail!("packageName must not be empty");
        }
        let pkg_dir = package_dir(&meta.package_name);

        let (main_source, user_file) = match meta.question_type {
            QuestionType::FunctionCall => (
                function_call_main(submission)?,
                "solution.py".to_string(),
            ),
            QuestionType::DesignClass => {
                let class_name = meta.function_name.trim();
                if class_name.is_empty() {
                    bail!("design-class questions require a class name in functionName");
                }
                (
                    design_class_main(submission)?,
                    format!("{}.py", class_name),
                )
            }
        };

        let files = vec![
            SourceFile {
                path: format!("{}/main.py", pkg_dir),
                contents: main_source,
            },
            SourceFile {
                path: format!("{}/{}", pkg_dir, user_file),
                contents: ensure_trailing_newline(&submission.source_code),
            },
        ];

        Ok(GeneratedHarness {
            files,
            package_dir: pkg_dir.clone(),
            entry_point: format!("{}/main.py", pkg_dir),
        })
    }
}

fn ensure_trailing_newline(source: &str) -> String {
    if source.ends_with('\n') {
        source.to_string()
    } else {
        format!("{}\n", source)
    }
}

// ---------------------------------------------------------------------------
// Function-call harness
// ---------------------------------------------------------------------------

fn function_call_main(submission: &CodeSubmission) -> Result<String> {
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

    let mut blocks = PyBlocks::new();
    let mut cases = String::new();
    let mut calls = String::new();
    for (i, case) in submission.cases.iter().enumerate() {
        calls.push_str(&format!("    _run_case_{}()\n", i));
        cases.push_str(&function_case(i, meta, &params, &return_shape, &case.input, &mut blocks)?);
        cases.push('\n');
    }

    Ok(format!(
        "import json\nimport sys\nimport time\n\nfrom solution import Solution\n\n{support}\n{cases}\ndef main():\n{calls}\n\nif __name__ == \"__main__\":\n    main()\n",
        support = blocks.render(),
        cases = cases,
        calls = calls,
    ))
}

fn function_case(
    index: usize,
    meta: &QuestionMetadata,
    params: &[(String, TypeShape)],
    return_shape: &TypeShape,
    input: &Value,
    blocks: &mut PyBlocks,
) -> Result<String> {
    let object = input
        .as_object()
        .with_context(|| format!("test case {} input must be a JSON object", index))?;

    let mut decls = String::new();
    for (name, shape) in params {
        let value = object.get(name).unwrap_or(&Value::Null);
        let literal = decode_expr(shape, value, blocks)
            .with_context(|| format!("test case {}, parameter {}", index, name))?;
        decls.push_str(&format!("        {} = {}\n", name, literal));
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
            format!("        solution.{}({})", meta.function_name, args),
            output_expr(target_shape, target_name, blocks)?,
        )
    } else {
        (
            format!("        result = solution.{}({})", meta.function_name, args),
            output_expr(return_shape, "result", blocks)?,
        )
    };

    Ok(format!(
        "def _run_case_{index}():\n    started = time.perf_counter()\n    elapsed = 0\n    output = \"\"\n    error = \"\"\n    try:\n{decls}        solution = Solution()\n        started = time.perf_counter()\n{invoke}\n        elapsed = int((time.perf_counter() - started) * 1000)\n        output = {serialize}\n    except BaseException as exc:\n        elapsed = int((time.perf_counter() - started) * 1000)\n        error = _describe(exc)\n    _emit({index}, output, elapsed, error)\n",
        index = index,
        decls = decls,
        invoke = invoke,
        serialize = serialize,
    ))
}

// ---------------------------------------------------------------------------
// Design-class harness
// ---------------------------------------------------------------------------

fn design_class_main(submission: &CodeSubmission) -> Result<String> {
    let meta = &submission.metadata;
    let class_name = meta.function_name.trim();

    let mut blocks = PyBlocks::new();
    blocks.require("design");
    for declared in &meta.custom_data_structures {
        match declared.as_str() {
            "ListNode" => blocks.require("list_node"),
            "TreeNode" => blocks.require("tree_node"),
            "Node" => blocks.require("graph_node"),
            other => bail!("unsupported custom data structure: {}", other),
        }
    }

    // `parameters` describes the constructor for design-class questions, so
    // its arguments can be decoded at generation time; method arguments are
    // coerced at call time from the method's own signature.
    let mut ctor_shapes: Vec<TypeShape> = Vec::with_capacity(meta.parameters.len());
    for p in &meta.parameters {
        let shape = TypeShape::parse(&p.type_name)
            .with_context(|| format!("unsupported constructor parameter type: {}", p.type_name))?;
        if shape == TypeShape::Void {
            bail!("void is not a valid constructor parameter type");
        }
        ctor_shapes.push(shape);
    }

    let mut cases = String::new();
    let mut calls = String::new();
    for (i, case) in submission.cases.iter().enumerate() {
        calls.push_str(&format!("    _run_case_{}()\n", i));
        cases.push_str(&design_case(i, class_name, &ctor_shapes, &case.input, &mut blocks)?);
        cases.push('\n');
    }

    Ok(format!(
        "import inspect\nimport json\nimport sys\nimport time\n\nfrom {class_name} import {class_name}\n\n{support}\n{cases}\ndef main():\n{calls}\n\nif __name__ == \"__main__\":\n    main()\n",
        class_name = class_name,
        support = blocks.render(),
        cases = cases,
        calls = calls,
    ))
}

fn design_case(
    index: usize,
    class_name: &str,
    ctor_shapes: &[TypeShape],
    input: &Value,
    blocks: &mut PyBlocks,
) -> Result<String> {
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
    for op in op_names {
        if !op.is_string() {
            bail!("design test case {}: operation names must be strings", index);
        }
    }

    let mut rows = Vec::with_capacity(op_args.len());
    for (i, row) in op_args.iter().enumerate() {
        let args = row
            .as_array()
            .with_context(|| format!("design test case {}: opArgs[{}] must be an array", index, i))?;
        let rendered: Vec<String> = if i == 0 {
            // constructor arguments follow the declared signature
            args.iter()
                .enumerate()
                .map(|(j, value)| match ctor_shapes.get(j) {
                    Some(shape) => decode_expr(shape, value, blocks),
                    None => Ok(python_literal(value)),
                })
                .collect::<Result<_>>()
                .with_context(|| format!("design test case {}: constructor arguments", index))?
        } else {
            args.iter().map(python_literal).collect()
        };
        rows.push(format!("[{}]", rendered.join(", ")));
    }

    Ok(format!(
        "def _run_case_{index}():\n    started = time.perf_counter()\n    elapsed = 0\n    output = \"\"\n    error = \"\"\n    try:\n        ops = {ops}\n        arg_lists = {arg_lists}\n        started = time.perf_counter()\n        results = _run_operations({class_name}, ops, arg_lists)\n        elapsed = int((time.perf_counter() - started) * 1000)\n        output = _object_to_json(results)\n    except BaseException as exc:\n        elapsed = int((time.perf_counter() - started) * 1000)\n        error = _describe(exc)\n    _emit({index}, output, elapsed, error)\n",
        index = index,
        ops = python_literal(&pair[0]),
        arg_lists = format!("[{}]", rows.join(", ")),
        class_name = class_name,
    ))
}

// ---------------------------------------------------------------------------
// Expression rendering
// ---------------------------------------------------------------------------

/// Decode expression for one parameter. Scalars and plain containers embed
/// as literals; data structures go through the builders.
fn decode_expr(shape: &TypeShape, value: &Value, blocks: &mut PyBlocks) -> Result<String> {
    match shape {
        TypeShape::ListNode => {
            blocks.require("list_node");
            require_array_or_null(shape, value)?;
            Ok(format!("_build_list_node({})", python_literal(value)))
        }
        TypeShape::TreeNode => {
            blocks.require("tree_node");
            require_array_or_null(shape, value)?;
            Ok(format!("_build_tree_node({})", python_literal(value)))
        }
        TypeShape::GraphNode => {
            blocks.require("graph_node");
            require_array_or_null(shape, value)?;
            Ok(format!("_build_graph_node({})", python_literal(value)))
        }
        TypeShape::Array(inner) | TypeShape::List(inner) => match inner.as_ref() {
            TypeShape::ListNode | TypeShape::TreeNode => {
                let items = value
                    .as_array()
                    .with_context(|| format!("expected array for {}", shape))?;
                let rendered = items
                    .iter()
                    .map(|item| decode_expr(inner, item, blocks))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("[{}]", rendered.join(", ")))
            }
            _ => Ok(python_literal(value)),
        },
        TypeShape::Void => bail!("void cannot be decoded"),
        _ => Ok(python_literal(value)),
    }
}

fn require_array_or_null(shape: &TypeShape, value: &Value) -> Result<()> {
    if value.is_array() || value.is_null() {
        Ok(())
    } else {
        bail!("expected a JSON array for {}, got {}", shape, value)
    }
}

fn output_expr(shape: &TypeShape, var: &str, blocks: &mut PyBlocks) -> Result<String> {
    match shape {
        TypeShape::Char => Ok(format!("str({})", var)),
        TypeShape::ListNode => {
            blocks.require("list_node");
            Ok(format!("_list_node_to_json({})", var))
        }
        TypeShape::TreeNode => {
            blocks.require("tree_node");
            Ok(format!("_tree_node_to_json({})", var))
        }
        TypeShape::GraphNode => {
            blocks.require("graph_node");
            Ok(format!("_graph_node_to_json({})", var))
        }
        TypeShape::Array(inner) | TypeShape::List(inner) => match inner.as_ref() {
            TypeShape::ListNode => {
                blocks.require("list_node");
                Ok(format!("_list_node_list_to_json({})", var))
            }
            TypeShape::TreeNode => {
                blocks.require("tree_node");
                Ok(format!("_tree_node_list_to_json({})", var))
            }
            TypeShape::GraphNode => bail!("unsupported collection of graph nodes"),
            _ => Ok(format!("_dump({})", var)),
        },
        TypeShape::Void => bail!("void has no serialized form"),
        _ => Ok(format!("_dump({})", var)),
    }
}

/// Render a JSON value as a Python literal.
fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
        }
        // JSON string escapes are a subset of Python's, so the JSON text is
        // reused verbatim.
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), python_literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Support blocks
// ---------------------------------------------------------------------------

struct PyBlocks {
    keys: BTreeSet<&'static str>,
}

impl PyBlocks {
    fn new() -> Self {
        PyBlocks {
            keys: BTreeSet::new(),
        }
    }

    fn require(&mut self, key: &'static str) {
        self.keys.insert(key);
    }

    fn render(&self) -> String {
        let mut out = String::from(BASE_SUPPORT);
        for key in ["list_node", "tree_node", "graph_node", "design"] {
            if self.keys.contains(key) {
                out.push('\n');
                out.push_str(block(key));
            }
        }
        out
    }
}

const BASE_SUPPORT: &str = r#"
def _dump(value):
    return json.dumps(value, separators=(",", ":"))


def _describe(exc):
    message = str(exc).replace("\n", " ").replace("\r", " ").replace(",", ";")
    name = type(exc).__name__
    if message:
        return "{}: {}".format(name, message)
    return name


def _emit(index, output, duration_ms, error):
    sys.stdout.write("TEST_CASE_RESULT: {},{},{},{}\n".format(index, output, duration_ms, error))
    sys.stdout.flush()

"#;

fn block(key: &str) -> &'static str {
    match key {
        "list_node" => {
            r#"
class ListNode:
    def __init__(self, val=0, next=None):
        self.val = val
        self.next = next


def _build_list_node(values):
    head = None
    tail = None
    for value in values or []:
        if value is None:
            continue
        node = ListNode(value)
        if head is None:
            head = node
        else:
            tail.next = node
        tail = node
    return head


def _list_node_to_list(head):
    values = []
    node = head
    while node is not None:
        values.append(node.val)
        node = node.next
    return values


def _list_node_to_json(head):
    return _dump(_list_node_to_list(head))


def _list_node_list_to_json(nodes):
    return _dump([_list_node_to_list(node) for node in nodes])

"#
        }
        "tree_node" => {
            r#"
class TreeNode:
    def __init__(self, val=0, left=None, right=None):
        self.val = val
        self.left = left
        self.right = right


def _build_tree_node(values):
    if not values or values[0] is None:
        return None
    root = TreeNode(values[0])
    queue = [root]
    index = 1
    while queue and index < len(values):
        node = queue.pop(0)
        value = values[index]
        index += 1
        if value is not None:
            node.left = TreeNode(value)
            queue.append(node.left)
        if index < len(values):
            value = values[index]
            index += 1
            if value is not None:
                node.right = TreeNode(value)
                queue.append(node.right)
    return root


def _tree_node_to_list(root):
    if root is None:
        return []
    values = []
    queue = [root]
    while queue:
        node = queue.pop(0)
        if node is None:
            values.append(None)
            continue
        values.append(node.val)
        queue.append(node.left)
        queue.append(node.right)
    while values and values[-1] is None:
        values.pop()
    return values


def _tree_node_to_json(root):
    return _dump(_tree_node_to_list(root))


def _tree_node_list_to_json(nodes):
    return _dump([_tree_node_to_list(node) for node in nodes])

"#
        }
        "graph_node" => {
            r#"
class Node:
    def __init__(self, val=0, neighbors=None):
        self.val = val
        self.neighbors = neighbors if neighbors is not None else []


def _build_graph_node(adjacency):
    if not adjacency:
        return None
    nodes = {label: Node(label) for label in range(1, len(adjacency) + 1)}
    for label, neighbor_labels in enumerate(adjacency, start=1):
        node = nodes[label]
        for neighbor_label in neighbor_labels:
            neighbor = nodes.get(neighbor_label)
            if neighbor is None:
                neighbor = Node(neighbor_label)
                nodes[neighbor_label] = neighbor
            node.neighbors.append(neighbor)
    return nodes[1]


def _graph_node_to_json(start):
    if start is None:
        return "[]"
    adjacency = {}
    visited = {start.val}
    queue = [start]
    max_label = start.val
    while queue:
        node = queue.pop(0)
        max_label = max(max_label, node.val)
        labels = []
        for neighbor in node.neighbors:
            labels.append(neighbor.val)
            if neighbor.val not in visited:
                visited.add(neighbor.val)
                queue.append(neighbor)
        adjacency[node.val] = labels
    return _dump([adjacency.get(label, []) for label in range(1, max_label + 1)])

"#
        }
        "design" => {
            r#"
def _substitute_prev(args, results):
    resolved = []
    for arg in args:
        if arg == "$PREV":
            resolved.append(results[-1])
        else:
            resolved.append(arg)
    return resolved


def _coerce_args(func, args):
    try:
        params = [p for p in inspect.signature(func).parameters.values()
                  if p.name != "self"]
    except (TypeError, ValueError):
        return args
    resolved = list(args)
    for i, param in enumerate(params[:len(resolved)]):
        value = resolved[i]
        if not isinstance(value, list) or param.annotation is inspect.Parameter.empty:
            continue
        text = getattr(param.annotation, "__name__", None) or str(param.annotation)
        if "ListNode" in text and "ListNode" in globals():
            resolved[i] = _build_list_node(value)
        elif "TreeNode" in text and "TreeNode" in globals():
            resolved[i] = _build_tree_node(value)
        elif "Node" in text and "Node" in globals():
            resolved[i] = _build_graph_node(value)
    return resolved


def _run_operations(cls, ops, arg_lists):
    results = [None]
    instance = cls(*_coerce_args(cls.__init__, arg_lists[0]))
    for i in range(1, len(ops)):
        args = _substitute_prev(arg_lists[i], results)
        method = getattr(instance, ops[i])
        results.append(method(*_coerce_args(method, args)))
    return results


def _object_to_json(value):
    if value is None:
        return "null"
    if isinstance(value, list):
        return "[" + ",".join(_object_to_json(v) for v in value) + "]"
    if "ListNode" in globals() and isinstance(value, ListNode):
        return _list_node_to_json(value)
    if "TreeNode" in globals() and isinstance(value, TreeNode):
        return _tree_node_to_json(value)
    if "Node" in globals() and isinstance(value, Node):
        return _graph_node_to_json(value)
    return _dump(value)

"#
        }
        _ => unreachable!("unknown block key"),
    }
}
