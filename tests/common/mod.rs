// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use viewmig::ConvertConfig;

/// A list view with a `=False` condition, an OR condition and a discussion panel.
pub const LEGACY_VIEW: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<odoo>
    <record id="view_task_tree" model="ir.ui.view">
        <field name="arch" type="xml">
            <tree string="Tasks">
                <field name="name"/>
                <field name="date_deadline" attrs="{'invisible': [('active', '=', False)]}"/>
            </tree>
        </field>
    </record>
    <record id="view_task_form" model="ir.ui.view">
        <field name="arch" type="xml">
            <form>
                <sheet>
                    <field name="user_id" attrs="{'readonly': ['|', ('state', '=', 'done'), ('locked', '=', True)]}"/>
                </sheet>
                <div class="oe_chatter">
                    <field name="message_follower_ids"/>
                    <field name="activity_ids"/>
                    <field name="message_ids"/>
                </div>
            </form>
        </field>
    </record>
</odoo>
"#;

/// Markup that needs no conversion
pub const CURRENT_VIEW: &str = r#"<odoo>
    <record id="view_task_list" model="ir.ui.view">
        <field name="arch" type="xml">
            <list><field name="name"/></list>
        </field>
    </record>
</odoo>
"#;

/// A source tree populated from `(relative path, content)` pairs.
///
/// Keep the returned TempDir alive to prevent cleanup.
pub fn module_tree(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("addons");
    fs::create_dir_all(&root).unwrap();
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    (temp_dir, root)
}

/// Default configuration over `root`
pub fn config_for(root: &Path) -> ConvertConfig {
    ConvertConfig {
        source_dir: root.to_path_buf(),
        ..Default::default()
    }
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

/// Every file under `root` with its content, relative paths sorted
pub fn snapshot(root: &Path) -> Vec<(PathBuf, String)> {
    let mut files: Vec<(PathBuf, String)> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, read(e.path()))
        })
        .collect();
    files.sort();
    files
}
