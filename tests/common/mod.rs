#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const WEB_CONFIG: &str =
    r#"<configuration><appSettings><add key="existing" value="1"/></appSettings></configuration>"#;

/// Write `contents` to `root/relative`, creating directories.
pub fn put(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A feed with `Web.Helpers 2.1.0` depending on `Core >= 1.0`, and two
/// versions of `Core`.
pub fn make_feed(root: &Path) {
    put(root, "Core/1.0.0/package.json", r#"{"id":"Core","version":"1.0.0"}"#);
    put(root, "Core/1.0.0/lib/net45/Core.dll", "core 1.0");
    put(root, "Core/1.5.0/package.json", r#"{"id":"Core","version":"1.5.0"}"#);
    put(root, "Core/1.5.0/lib/net45/Core.dll", "core 1.5");

    let helpers = "Web.Helpers/2.1.0";
    put(
        root,
        &format!("{}/package.json", helpers),
        r#"{
            "id": "Web.Helpers",
            "version": "2.1.0",
            "dependencies": [{"id": "Core", "range": "1.0"}],
            "frameworkReferences": [{"framework": "any", "items": ["System.Web"]}]
        }"#,
    );
    put(root, &format!("{}/lib/net45/Web.Helpers.dll", helpers), "helpers");
    put(root, &format!("{}/content/readme.txt", helpers), "Read me\n");
    put(
        root,
        &format!("{}/content/Models/Helper.cs.pp", helpers),
        "namespace $rootnamespace$.Models\n",
    );
    put(
        root,
        &format!("{}/content/web.config.transform", helpers),
        r#"<configuration><appSettings><add key="helpers" value="on"/></appSettings></configuration>"#,
    );
    put(root, &format!("{}/build/net45/Web.Helpers.targets", helpers), "<Project/>");
}

/// An empty project directory holding only `web.config`.
pub fn make_project_dir(root: &Path) {
    put(root, "web.config", WEB_CONFIG);
}
