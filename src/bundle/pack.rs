// src/bundle/pack.rs

//! Packing a closure into a single CommonJS-style script.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use sourcemap::SourceMapBuilder;

use crate::bundle::graph::{ModuleKind, ModuleNode};
use crate::errors::Result;
use crate::fs::rel_string;

/// Runtime wrapped around the module table. `modules[id]` is
/// `[factory, {specifier: id}]`.
const PRELUDE: &str = "\
(function (modules, entry) {
  var cache = {};
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var module = cache[id] = { exports: {} };
    var def = modules[id];
    def[0].call(module.exports, function (name) {
      var dep = def[1][name];
      if (dep === undefined) throw new Error(\"Cannot find module '\" + name + \"'\");
      return load(dep);
    }, module, module.exports);
    return module.exports;
  }
  load(entry);
})({";

/// A packed bundle, regenerated wholesale on every build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
    /// Output file name, e.g. `main.js`.
    pub name: String,
    pub code: String,
    /// Source map JSON, present in debug builds.
    pub map: Option<String>,
}

impl BundleArtifact {
    pub fn map_name(&self) -> String {
        format!("{}.map", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Emit per-module path comments, a source map and a
    /// `sourceMappingURL` trailer.
    pub debug: bool,
    /// Source paths in comments and the map are relative to this.
    pub root: PathBuf,
}

/// Output file name for an entry: `static/js/main.js` -> `main.js`.
pub fn artifact_name(entry: &Path) -> String {
    let stem = entry
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    format!("{stem}.js")
}

struct Emitter {
    out: String,
    line: u32,
}

impl Emitter {
    fn push_line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
        self.line += 1;
    }
}

/// Pack `modules` (post-order, entry last) into one artifact.
///
/// Module ids are positions in `modules`, so equal closures give equal
/// bytes.
pub fn pack(name: &str, modules: &[&ModuleNode], opts: &PackOptions) -> Result<BundleArtifact> {
    let entry_id = modules
        .len()
        .checked_sub(1)
        .ok_or_else(|| anyhow!("cannot pack an empty module list for {name}"))?;

    let ids: HashMap<&Path, usize> = modules
        .iter()
        .enumerate()
        .map(|(id, node)| (node.path.as_path(), id))
        .collect();

    let mut em = Emitter {
        out: String::new(),
        line: 0,
    };
    let mut map = opts.debug.then(|| SourceMapBuilder::new(Some(name)));

    for text in PRELUDE.split('\n') {
        em.push_line(text);
    }

    for (id, node) in modules.iter().enumerate() {
        let rel = rel_string(&opts.root, &node.path);
        em.push_line(&format!("{id}: [function (require, module, exports) {{"));
        if opts.debug {
            em.push_line(&format!("// {rel}"));
        }

        let source_id = map.as_mut().map(|builder| {
            let source_id = builder.add_source(&rel);
            builder.set_source_contents(source_id, Some(&*node.source));
            source_id
        });

        let body = node.source.strip_suffix('\n').unwrap_or(&node.source);
        if node.kind == ModuleKind::Json {
            em.push_line("module.exports =");
        }
        for (src_line, text) in body.split('\n').enumerate() {
            if let (Some(builder), Some(source_id)) = (map.as_mut(), source_id) {
                builder.add_raw(em.line, 0, src_line as u32, 0, Some(source_id), None, false);
            }
            em.push_line(text);
        }
        if node.kind == ModuleKind::Json {
            em.push_line(";");
        }

        let mut table: BTreeMap<&str, usize> = BTreeMap::new();
        for dep in &node.deps {
            let dep_id = ids
                .get(dep.resolved.as_path())
                .copied()
                .ok_or_else(|| anyhow!("{} is not part of the closure of {name}", dep.resolved.display()))?;
            table.insert(&dep.specifier, dep_id);
        }
        let table = serde_json::to_string(&table).context("encoding module table")?;
        let sep = if id == entry_id { "" } else { "," };
        em.push_line(&format!("}}, {table}]{sep}"));
    }

    em.push_line(&format!("}}, {entry_id});"));

    let map = match map {
        Some(builder) => {
            em.push_line(&format!("//# sourceMappingURL={name}.map"));
            let mut bytes = Vec::new();
            builder
                .into_sourcemap()
                .to_writer(&mut bytes)
                .map_err(|e| anyhow!("encoding source map for {name}: {e}"))?;
            Some(String::from_utf8(bytes).context("source map is not UTF-8")?)
        }
        None => None,
    };

    Ok(BundleArtifact {
        name: name.to_string(),
        code: em.out,
        map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::graph::{Dependency, content_hash};
    use std::sync::Arc;

    fn node(path: &str, source: &str, deps: &[(&str, &str)]) -> ModuleNode {
        ModuleNode {
            path: PathBuf::from(path),
            source: Arc::from(source),
            hash: content_hash(source.as_bytes()),
            kind: if path.ends_with(".json") {
                ModuleKind::Json
            } else {
                ModuleKind::Script
            },
            deps: deps
                .iter()
                .map(|(spec, resolved)| Dependency {
                    specifier: spec.to_string(),
                    resolved: PathBuf::from(resolved),
                    probed: Vec::new(),
                })
                .collect(),
        }
    }

    fn opts(debug: bool) -> PackOptions {
        PackOptions {
            debug,
            root: PathBuf::from("."),
        }
    }

    #[test]
    fn entry_gets_the_last_id_and_tables_map_specifiers() {
        let lib = node("static/js/lib.js", "module.exports = 1;\n", &[]);
        let data = node("static/js/data.json", "{\"a\": 1}\n", &[]);
        let main = node(
            "static/js/main.js",
            "var lib = require('./lib');\nvar d = require('./data.json');\n",
            &[("./lib", "static/js/lib.js"), ("./data.json", "static/js/data.json")],
        );

        let art = pack("main.js", &[&lib, &data, &main], &opts(false)).unwrap();
        assert!(art.code.starts_with("(function (modules, entry) {"));
        assert!(art.code.contains("2: [function (require, module, exports) {"));
        assert!(art.code.contains(r#"}, {"./data.json":1,"./lib":0}]"#));
        assert!(art.code.contains("module.exports =\n{\"a\": 1}\n;"));
        assert!(art.code.trim_end().ends_with("}, 2);"));
        assert!(art.map.is_none());
        assert!(!art.code.contains("sourceMappingURL"));
    }

    #[test]
    fn debug_adds_comments_and_a_line_map() {
        let lib = node("static/js/lib.js", "a();\nb();\n", &[]);
        let main = node("static/js/main.js", "require('./lib');\n", &[("./lib", "static/js/lib.js")]);

        let art = pack("main.js", &[&lib, &main], &opts(true)).unwrap();
        assert!(art.code.contains("// static/js/lib.js\n"));
        assert!(art.code.trim_end().ends_with("//# sourceMappingURL=main.js.map"));

        let map = sourcemap::SourceMap::from_slice(art.map.as_deref().unwrap().as_bytes()).unwrap();
        assert_eq!(map.get_source(0), Some("static/js/lib.js"));
        assert_eq!(map.get_source_contents(0), Some("a();\nb();\n"));

        // `b();` is line 1 of lib.js; find it in the output and check the map.
        let out_line = art.code.lines().position(|l| l == "b();").unwrap() as u32;
        let token = map.lookup_token(out_line, 0).unwrap();
        assert_eq!(token.get_src_line(), 1);
        assert_eq!(token.get_source(), Some("static/js/lib.js"));
    }

    #[test]
    fn packing_is_deterministic() {
        let lib = node("lib.js", "x();\n", &[]);
        let main = node("main.js", "require('./lib');\n", &[("./lib", "lib.js")]);
        let a = pack("main.js", &[&lib, &main], &opts(true)).unwrap();
        let b = pack("main.js", &[&lib, &main], &opts(true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn artifact_names_follow_the_entry_stem() {
        assert_eq!(artifact_name(Path::new("static/js/main.js")), "main.js");
        assert_eq!(artifact_name(Path::new("studies/static/js/study.js")), "study.js");
    }
}
