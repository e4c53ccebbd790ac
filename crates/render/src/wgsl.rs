//! Minimal WGSL reflection: just enough to map uniform names to bindings
//! and to know which vertex attribute locations a vertex stage reads.

use std::collections::BTreeSet;

/// A module-scope `var<uniform>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Declared type with whitespace removed, e.g. `mat4x4<f32>`.
    pub ty: String,
}

impl UniformDecl {
    pub fn is_mat4(&self) -> bool {
        matches!(self.ty.as_str(), "mat4x4<f32>" | "mat4x4f")
    }
}

const UNIFORM_VAR: &str = "var<uniform>";

/// Uniform declarations in source order. Missing `@group`/`@binding`
/// attributes read as 0.
pub fn declared_uniforms(source: &str) -> Vec<UniformDecl> {
    let code = strip_comments(source);
    let mut decls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = code[cursor..].find(UNIFORM_VAR) {
        let at = cursor + found;
        cursor = at + UNIFORM_VAR.len();

        let attrs_start = code[..at].rfind([';', '}']).map_or(0, |i| i + 1);
        let attrs = &code[attrs_start..at];

        let Some(end) = code[cursor..].find(';') else {
            break;
        };
        let Some((name, ty)) = code[cursor..cursor + end].split_once(':') else {
            continue;
        };
        let name = name.trim();
        if !is_identifier(name) {
            continue;
        }

        decls.push(UniformDecl {
            name: name.to_string(),
            group: attribute_value(attrs, "group").unwrap_or(0),
            binding: attribute_value(attrs, "binding").unwrap_or(0),
            ty: ty.chars().filter(|c| !c.is_whitespace()).collect(),
        });
    }

    decls
}

/// Attribute locations read by the first `@vertex` entry point, ascending.
/// Struct-typed parameters contribute the `@location`s of their members;
/// `@builtin` inputs are skipped.
pub fn vertex_inputs(source: &str) -> Vec<u32> {
    let code = strip_comments(source);
    let Some(params) = entry_parameters(&code, "@vertex") else {
        return Vec::new();
    };

    let mut locations = BTreeSet::new();
    for param in split_top_level(params) {
        if param.contains("@builtin") {
            continue;
        }
        if let Some(location) = attribute_value(param, "location") {
            locations.insert(location);
            continue;
        }
        let Some((_, ty)) = param.split_once(':') else {
            continue;
        };
        if let Some(body) = struct_body(&code, ty.trim()) {
            locations.extend(
                split_top_level(body)
                    .filter(|member| !member.contains("@builtin"))
                    .filter_map(|member| attribute_value(member, "location")),
            );
        }
    }
    locations.into_iter().collect()
}

/// Text between the parentheses of the function following `attribute`.
fn entry_parameters<'a>(code: &'a str, attribute: &str) -> Option<&'a str> {
    let at = code.find(attribute)? + attribute.len();
    let rest = &code[at..];
    let name_at = rest.find("fn ")?;
    let open = name_at + rest[name_at..].find('(')?;
    let mut depth = 0usize;
    for (i, c) in rest[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Members of `struct name { ... }`, without the braces.
fn struct_body<'a>(code: &'a str, name: &str) -> Option<&'a str> {
    let mut cursor = 0;
    while let Some(found) = code[cursor..].find("struct") {
        let after = cursor + found + "struct".len();
        cursor = after;
        let rest = &code[after..];
        let open = rest.find('{')?;
        if rest[..open].trim() != name {
            continue;
        }
        let close = rest[open..].find('}')?;
        return Some(&rest[open + 1..open + close]);
    }
    None
}

/// Comma-separated items, ignoring commas nested inside `()` or `<>`.
fn split_top_level(list: &str) -> impl Iterator<Item = &str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' | '<' => depth += 1,
            ')' | '>' => depth -= 1,
            ',' if depth == 0 => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items.into_iter().map(str::trim).filter(|item| !item.is_empty())
}

fn attribute_value(attrs: &str, name: &str) -> Option<u32> {
    let pattern = format!("@{name}(");
    let start = attrs.find(&pattern)? + pattern.len();
    let len = attrs[start..].find(')')?;
    attrs[start..start + len].trim().parse().ok()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Replace `//` and `/* */` comments with whitespace.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut block_depth = 0usize;

    while let Some(c) = chars.next() {
        if block_depth > 0 {
            match (c, chars.peek()) {
                ('*', Some('/')) => {
                    chars.next();
                    block_depth -= 1;
                    out.push(' ');
                }
                ('/', Some('*')) => {
                    chars.next();
                    block_depth += 1;
                }
                ('\n', _) => out.push('\n'),
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                block_depth = 1;
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_mat4_uniform_with_bindings() {
        let src = "@group(0) @binding(2)\nvar<uniform> model_view_projection: mat4x4<f32>;";
        let decls = declared_uniforms(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "model_view_projection");
        assert_eq!(decls[0].group, 0);
        assert_eq!(decls[0].binding, 2);
        assert!(decls[0].is_mat4());
    }

    #[test]
    fn struct_typed_uniform_is_not_mat4() {
        let src = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
"#;
        let decls = declared_uniforms(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "uniforms");
        assert_eq!(decls[0].ty, "Uniforms");
        assert!(!decls[0].is_mat4());
    }

    #[test]
    fn commented_out_declarations_are_ignored() {
        let src = r#"
// @group(0) @binding(0) var<uniform> old: mat4x4<f32>;
/* @group(0) @binding(1) var<uniform> older: mat4x4<f32>; */
@group(0) @binding(3) var<uniform> mvp: mat4x4f;
"#;
        let decls = declared_uniforms(src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "mvp");
        assert_eq!(decls[0].binding, 3);
    }

    #[test]
    fn multiple_declarations_keep_source_order() {
        let src = "@group(0) @binding(0) var<uniform> a: mat4x4<f32>;\n\
                   @group(0) @binding(1) var<uniform> b: mat4x4<f32>;";
        let names: Vec<_> = declared_uniforms(src).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn vertex_inputs_from_parameters() {
        let src = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec3<f32>) -> VertexOut {
    return VertexOut();
}
"#;
        assert_eq!(vertex_inputs(src), vec![0, 1]);
    }

    #[test]
    fn vertex_inputs_from_struct_members() {
        let src = r#"
struct VertexIn {
    @location(2) uv: vec2<f32>,
    @location(0) position: vec3<f32>,
};

@vertex
fn vs_main(input: VertexIn, @builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(input.position, 1.0);
}
"#;
        assert_eq!(vertex_inputs(src), vec![0, 2]);
    }

    #[test]
    fn position_only_stage_reads_one_location() {
        let src = "@vertex fn vs(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(p, 1.0); }";
        assert_eq!(vertex_inputs(src), vec![0]);
        assert!(vertex_inputs("@fragment fn fs_main() {}").is_empty());
    }

    #[test]
    fn source_without_uniforms() {
        assert!(declared_uniforms("@fragment fn fs_main() {}").is_empty());
    }
}
