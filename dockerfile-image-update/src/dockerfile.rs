//! Line-oriented Dockerfile image reference rewriting.
//!
//! Full Dockerfile parsing is out of scope. Only `FROM` lines are inspected,
//! and only the image token is replaced.

use crate::image::ImageReference;

/// Rewrites every `FROM` line referencing `image.name` so it points at
/// `image.tag`.
///
/// Instruction flags such as `--platform=...` and stage aliases (`AS build`)
/// are preserved. A line only matches when the image name is exactly
/// `image.name`, with any current tag or none; digest references are left
/// untouched. Returns the rewritten content and whether anything changed.
#[must_use]
pub fn rewrite_image(content: &str, image: &ImageReference) -> (String, bool) {
    let mut changed = false;
    let mut lines = Vec::new();

    for line in content.lines() {
        match rewrite_from_line(line, image) {
            Some(rewritten) => {
                changed = true;
                lines.push(rewritten);
            }
            None => lines.push(line.to_string()),
        }
    }

    let mut rewritten = lines.join("\n");
    if content.ends_with('\n') {
        rewritten.push('\n');
    }
    (rewritten, changed)
}

/// Rewrites a single line, or `None` when it is left untouched.
fn rewrite_from_line(line: &str, image: &ImageReference) -> Option<String> {
    let mut tokens = line.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("FROM") {
        return None;
    }

    // The image token is the first argument that is not an instruction flag.
    let current = tokens.find(|token| !token.starts_with("--"))?;
    if !references_image(current, &image.name) {
        return None;
    }

    let replacement = image.to_string();
    if current == replacement {
        return None;
    }
    Some(line.replacen(current, &replacement, 1))
}

/// Whether `token` is `name`, with any tag or no tag at all.
fn references_image(token: &str, name: &str) -> bool {
    if token == name {
        return true;
    }
    matches!(token.rsplit_once(':'), Some((image, _)) if image == name)
}
