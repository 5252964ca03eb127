use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn clips_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("clips");
    path
}

/// Blank PDF with `pages` pages.
fn pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let library = root.join("library");
    let source = library.join("jornal.com.br-info");
    for dir in ["json", "clips", "fullpages"] {
        fs::create_dir_all(source.join(dir)).unwrap();
    }
    fs::write(
        source.join("json/clips.json"),
        r#"{
            "A1": {"title": "Eleição municipal", "pointers": "001-01, 001-02"},
            "B2": {"title": "Futebol", "pointers": "005-01"},
            "C3": {"title": "   ", "pointers": "404-01"}
        }"#,
    )
    .unwrap();
    fs::write(source.join("clips/jornal-001-01.pdf"), pdf(1)).unwrap();
    fs::write(source.join("clips/001-02.pdf"), pdf(2)).unwrap();
    fs::write(source.join("clips/005-01.pdf"), pdf(1)).unwrap();
    fs::write(
        source.join("fullpages/jornal.com.br-info-001.pdf"),
        pdf(1),
    )
    .unwrap();

    fs::create_dir_all(library.join("empty")).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("clips.toml");
    fs::write(
        &config_path,
        format!(
            r#"[library]
root = "{}"

[overlay]
zoom = 1.0
density = 1.0
"#,
            library.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_clips(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = clips_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run clips binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_sources_lists_every_folder() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_clips(&config_path, &["sources"]);
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("jornal.com.br-info"));
    assert!(stdout.contains("empty"));
    assert!(stdout.contains("2 sources, 3 clips"));
    // "empty" has no metadata folder; the load error shows in its row.
    let empty_row = stdout
        .lines()
        .find(|l| l.starts_with("empty"))
        .unwrap();
    assert!(empty_row.contains("\"json\" not found"), "row: {}", empty_row);
}

#[test]
fn test_list_with_filter() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_clips(&config_path, &["list", "jornal.com.br-info"]);
    assert!(success);
    assert!(stdout.contains("Eleição municipal"));
    // Blank title falls back to the id.
    assert!(stdout.contains("C3"));
    assert!(stdout.contains("3 of 3 clips"));

    let (stdout, _, success) = run_clips(
        &config_path,
        &["list", "jornal.com.br-info", "--filter", "FUTEBOL"],
    );
    assert!(success);
    assert!(stdout.contains("Futebol"));
    assert!(!stdout.contains("Eleição"));
    assert!(stdout.contains("1 of 3 clips"));
}

#[test]
fn test_resolve_reports_unresolved_pointers() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_clips(&config_path, &["resolve", "jornal.com.br-info", "A1"]);
    assert!(success, "resolve failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("jornal-001-01.pdf"));
    assert!(stdout.contains("001-02.pdf"));
    assert!(stdout.contains("2 resolved, 0 unresolved"));

    let (stdout, _, success) = run_clips(&config_path, &["resolve", "jornal.com.br-info", "C3"]);
    assert!(success, "an unresolved pointer is not a failure");
    assert!(stdout.contains("0 resolved, 1 unresolved"));
}

#[test]
fn test_assemble_merges_pages() {
    let (tmp, config_path) = setup_test_env();
    let out = tmp.path().join("a1.pdf");

    let (stdout, stderr, success) = run_clips(
        &config_path,
        &[
            "assemble",
            "jornal.com.br-info",
            "A1",
            "--out",
            out.to_str().unwrap(),
        ],
    );
    assert!(success, "assemble failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("3 pages"));
    let doc = Document::load(&out).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn test_assemble_single_file_is_copied_unchanged() {
    let (tmp, config_path) = setup_test_env();
    let out = tmp.path().join("b2.pdf");

    let (stdout, _, success) = run_clips(
        &config_path,
        &[
            "assemble",
            "jornal.com.br-info",
            "#2",
            "--out",
            out.to_str().unwrap(),
        ],
    );
    assert!(success);
    assert!(stdout.contains("unchanged"));
    let original = tmp
        .path()
        .join("library/jornal.com.br-info/clips/005-01.pdf");
    assert_eq!(fs::read(&out).unwrap(), fs::read(original).unwrap());
}

#[test]
fn test_assemble_fullpage_category() {
    let (tmp, config_path) = setup_test_env();
    let out = tmp.path().join("full.pdf");

    let (stdout, stderr, success) = run_clips(
        &config_path,
        &[
            "assemble",
            "jornal.com.br-info",
            "A1",
            "--category",
            "fullpage",
            "--out",
            out.to_str().unwrap(),
        ],
    );
    assert!(success, "assemble failed: stdout={}, stderr={}", stdout, stderr);
    // Both pointers are on page 001.
    assert_eq!(Document::load(&out).unwrap().get_pages().len(), 2);
}

#[test]
fn test_assemble_nothing_resolved() {
    let (tmp, config_path) = setup_test_env();
    let out = tmp.path().join("none.pdf");

    let (stdout, _, success) = run_clips(
        &config_path,
        &[
            "assemble",
            "jornal.com.br-info",
            "C3",
            "--out",
            out.to_str().unwrap(),
        ],
    );
    assert!(success);
    assert!(stdout.contains("no document"));
    assert!(!out.exists());
}

#[test]
fn test_unknown_clip_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_clips(&config_path, &["resolve", "jornal.com.br-info", "ZZ"]);
    assert!(!success);
    assert!(stderr.contains("ZZ"));
}

#[test]
fn test_missing_root_fails() {
    let tmp = TempDir::new().unwrap();
    let absent = tmp.path().join("absent.toml");

    let (_, stderr, success) = run_clips(&absent, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("No library root"));
}

#[test]
fn test_root_flag_overrides_config() {
    let (tmp, _) = setup_test_env();
    let absent = tmp.path().join("absent.toml");
    let library = tmp.path().join("library");

    let (stdout, _, success) = run_clips(
        &absent,
        &["sources", "--root", library.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("jornal.com.br-info"));
}

#[test]
fn test_overlay_writes_page_images() {
    let (tmp, config_path) = setup_test_env();
    let viewer = tmp.path().join("viewer");
    fs::create_dir_all(viewer.join("json")).unwrap();
    fs::create_dir_all(viewer.join("fullpages")).unwrap();
    fs::write(
        viewer.join("json/data.json"),
        r#"{"A1": {"title": "Eleição", "domain": "jornal.com", "cropAreas": [
            {"page": "2", "x": "0.1", "y": "0.9", "width": "0.3", "height": "0.3"},
            {"page": "1", "x": "0.5", "y": "0.5", "width": "0.2", "height": "0.2"},
            {"page": "7", "x": "0.5", "y": "0.5", "width": "0.2", "height": "0.2"}
        ]}}"#,
    )
    .unwrap();
    for page in ["001", "002"] {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 40, Rgb([255, 255, 255])))
            .save_with_format(
                viewer.join(format!("fullpages/jornal.com-{}.jpg", page)),
                ImageFormat::Jpeg,
            )
            .unwrap();
    }
    let out_dir = tmp.path().join("out");

    let (stdout, stderr, success) = run_clips(
        &config_path,
        &[
            "overlay",
            viewer.to_str().unwrap(),
            "A1",
            "--out-dir",
            out_dir.to_str().unwrap(),
            "--zoom",
            "2",
        ],
    );
    assert!(success, "overlay failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 pages rendered at 200%"));
    assert!(stderr.contains("skipped page 7"));

    let page = image::open(out_dir.join("page-1.png")).unwrap();
    assert_eq!((page.width(), page.height()), (120, 80));
    assert!(out_dir.join("page-2.png").exists());
    assert!(!out_dir.join("page-7.png").exists());
}

#[test]
fn test_overlay_missing_fullpages_fails() {
    let (tmp, config_path) = setup_test_env();
    let viewer = tmp.path().join("viewer");
    fs::create_dir_all(viewer.join("json")).unwrap();

    let (_, stderr, success) = run_clips(
        &config_path,
        &[
            "overlay",
            viewer.to_str().unwrap(),
            "A1",
            "--out-dir",
            tmp.path().join("out").to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("fullpages"));
}
