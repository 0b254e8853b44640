// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Dependency graph rendering.

Renders a resolved set as a Graphviz document, one node per package and
one edge per rewritten requirement. Purely a diagnostic aid.
*/

use {
    crate::{
        error::{AcquireError, Result},
        resolver::ResolvedSet,
    },
    std::path::Path,
};

/// Render the dependency graph of a resolved set in DOT syntax.
pub fn render_dot(set: &ResolvedSet) -> String {
    let mut out = String::from("digraph G {\n    rankdir=LR;\n");

    for package in set.iter() {
        out.push_str(&format!(
            "    \"{}\" [label=\"{}\"];\n",
            package.descriptor.name, package.descriptor.name
        ));
    }

    for package in set.iter() {
        for requirement in &package.requires {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                package.descriptor.name, requirement
            ));
        }
    }

    out.push_str("}\n");
    out
}

/// Write the DOT rendering of a resolved set to a file.
pub fn write_dot(set: &ResolvedSet, path: &Path) -> Result<()> {
    std::fs::write(path, render_dot(set))
        .map_err(|e| AcquireError::IoPath(path.display().to_string(), e))
}
