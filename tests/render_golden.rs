//! Parse every `tests/fixtures/*.html` and compare the serialized tree with the `.out` file
//! next to it.

use std::{fs, path::Path};

use markquery::{
    dom::check_tree,
    html::{parse, render_to_string},
};

fn render_file(path: &Path) -> String {
    let source = fs::read_to_string(path).unwrap();
    let doc = parse(&source).unwrap();
    if let Err(err) = check_tree(&doc) {
        panic!("{}: {err}", path.display());
    }
    render_to_string(&doc).unwrap()
}

#[test]
fn render_golden_fixtures() {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/*.html");
    let mut count = 0;
    for entry in glob::glob(pattern).expect("Failed to read glob pattern") {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                println!("{e:?}");
                continue;
            }
        };
        let expected = fs::read_to_string(path.with_extension("out"))
            .unwrap_or_else(|e| panic!("{}: missing result file: {e}", path.display()));
        let actual = render_file(&path);
        assert_eq!(actual, expected, "{}", path.display());

        // the serialized form parses back to the same tree
        let reparsed = render_to_string(&parse(&actual).unwrap()).unwrap();
        assert_eq!(reparsed, actual, "{}: second pass", path.display());
        count += 1;
    }
    assert!(count > 0, "no fixtures found");
}
