// src/config/defaults.rs

//! Configuration used when no `Rebundle.toml` exists.
//!
//! Mirrors the front-end pipeline of a Django-style project: script entries
//! under `static/js/` (top level and per app), style sheets under
//! `static/css/` with `_`-prefixed partials, and vendor assets copied out of
//! `node_modules`.

pub const BUILTIN_CONFIG: &str = r#"
[config]
output_dir = "build"
debounce_ms = 100
ignore_dirs = ["node_modules", ".git", "build"]

[resolve]
extensions = [".js", ".json"]
module_dirs = ["node_modules"]

[task.clean]
kind = "clean"

[task.lint-js]
kind = "command"
cmd = "eslint static/js '**/static/js/*.js'"

[task.lint-python]
kind = "command"
cmd = "flake8 ."

[task.lint]
kind = "group"
after = ["lint-js", "lint-python"]

[task.bootstrap-files]
kind = "copy"
dest = "vendor"
files = [
    "./node_modules/bootstrap/dist/css/bootstrap.css",
    "./node_modules/bootstrap/dist/css/bootstrap.css.map",
    "./node_modules/bootstrap/dist/css/bootstrap-theme.css",
    "./node_modules/bootstrap/dist/css/bootstrap-theme.css.map",
]

[task.select2-files]
kind = "copy"
dest = "vendor"
files = ["./node_modules/select2/dist/css/select2.min.css"]

[task.webshim-files]
kind = "copy"
dest = "vendor/shims"
files = ["./node_modules/webshim/js-webshim/minified/shims/**/*"]

[task.frontend-files]
kind = "group"
after = ["bootstrap-files", "select2-files", "webshim-files"]

[task.postcss]
kind = "styles"
dest = "css"
entries = ["./static/css/**/*.css", "!./static/css/**/_*.css"]

[task.browserify]
kind = "bundle"
dest = "js"
after = ["frontend-files"]
entries = ["./static/js/*.js", "./**/static/js/*.js"]

[task.watch-css]
kind = "watch"
after = ["frontend-files"]
patterns = ["./static/css/**/*.css"]
run = "postcss"

[task.livereload]
kind = "notifier"

[task.build]
kind = "group"
after = ["frontend-files", "postcss", "browserify"]

[task.default]
kind = "group"
after = ["frontend-files", "postcss", "watch-css", "browserify", "livereload"]
"#;
