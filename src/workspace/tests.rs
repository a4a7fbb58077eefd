use std::fs;

use rstest::{
    fixture,
    rstest,
};
use tempfile::TempDir;

use super::*;

struct Fixture {
    _dir:    TempDir,
    outside: PathBuf,
    dm:      DataManager,
}

#[fixture]
fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let outside = dir.path().join("outside");
    fs::create_dir(&outside).unwrap();
    let dm = DataManager::new(Some(dir.path().join("ws"))).unwrap();
    Fixture {
        _dir: dir,
        outside,
        dm,
    }
}

#[rstest]
fn test_resolve_within_root(setup: Fixture) {
    let root = setup.dm.workspace_path().clone();
    fs::write(root.join("data/a.csv"), "x").unwrap();

    let resolved = resolve_within(&root, "data/a.csv").unwrap();
    assert!(resolved.ends_with("data/a.csv"));
    assert!(resolve_within(&root, "data/./../data/a.csv").is_ok());
}

#[rstest]
#[case("../outside")]
#[case("data/../../outside")]
#[case("../../etc/passwd")]
fn test_resolve_rejects_escapes(
    setup: Fixture,
    #[case] rel: &str,
) {
    let root = setup.dm.workspace_path().clone();
    assert!(matches!(
        resolve_within(&root, rel),
        Err(WorkspaceError::AccessDenied(_))
    ));
}

#[rstest]
fn test_resolve_rejects_absolute_outside(setup: Fixture) {
    let root = setup.dm.workspace_path().clone();
    assert!(matches!(
        resolve_within(&root, &setup.outside),
        Err(WorkspaceError::AccessDenied(_))
    ));
}

#[rstest]
fn test_resolve_missing(setup: Fixture) {
    let root = setup.dm.workspace_path().clone();
    assert!(matches!(
        resolve_within(&root, "data/missing.csv"),
        Err(WorkspaceError::NotFound(_))
    ));
}

#[rstest]
fn test_upload_loads_tabular(mut setup: Fixture) {
    let src = setup.outside.join("counts.tsv");
    fs::write(&src, "cell\tA\tB\nc1\t1\t2\nc2\t3\t4\n").unwrap();

    let outcome = upload(&mut setup.dm, &src).unwrap();
    assert!(outcome.data_loaded);
    assert_eq!(outcome.file_type, Some(FileType::Tsv));
    assert!(setup.dm.data_dir().join("counts.tsv").exists());
    assert_eq!(setup.dm.matrix().unwrap().shape(), (2, 2));
}

#[rstest]
fn test_upload_from_data_dir_keeps_file(mut setup: Fixture) {
    let src = setup.dm.data_dir().join("counts.csv");
    fs::write(&src, "cell,A,B\nc1,1,2\nc2,3,4\n").unwrap();
    let size = fs::metadata(&src).unwrap().len();

    let outcome = upload(&mut setup.dm, &src).unwrap();
    assert_eq!(fs::metadata(&src).unwrap().len(), size);
    assert_eq!(outcome.size, size);
    assert!(outcome.data_loaded);
    assert_eq!(setup.dm.matrix().unwrap().shape(), (2, 2));

    // Same file through a path that is not byte-identical.
    let dotted = setup.dm.data_dir().join(".").join("counts.csv");
    upload(&mut setup.dm, &dotted).unwrap();
    assert_eq!(fs::metadata(&src).unwrap().len(), size);
}

#[rstest]
fn test_upload_unknown_type(mut setup: Fixture) {
    let src = setup.outside.join("notes.md");
    fs::write(&src, "# notes").unwrap();

    let outcome = upload(&mut setup.dm, &src).unwrap();
    assert!(!outcome.data_loaded);
    assert!(outcome.file_type.is_none());
    assert!(!setup.dm.has_data());
}

#[rstest]
fn test_upload_missing(mut setup: Fixture) {
    let src = setup.outside.join("nope.csv");
    assert!(matches!(
        upload(&mut setup.dm, &src),
        Err(WorkspaceError::NotFound(_))
    ));
}

#[rstest]
fn test_list_delete_info(setup: Fixture) {
    let root = setup.dm.workspace_path().clone();
    fs::write(root.join("data/b.csv"), "x,y\n").unwrap();
    fs::write(root.join("data/a.csv"), "x\n").unwrap();
    fs::write(root.join("plots/p.html"), "<html/>").unwrap();

    let all = list(&setup.dm, None).unwrap();
    let names = all.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["a.csv", "b.csv", "p.html"]);
    assert_eq!(all[2].category, Category::Plots);
    assert_eq!(list(&setup.dm, Some(Category::Exports)).unwrap().len(), 0);

    let info = info(&root, "data/b.csv").unwrap();
    assert_eq!(info.size, 4);
    assert_eq!(info.file_type, Some(FileType::Csv));
    assert!(!info.is_dir);

    delete(&root, "data/b.csv").unwrap();
    assert!(!root.join("data/b.csv").exists());

    fs::create_dir(root.join("exports/run")).unwrap();
    fs::write(root.join("exports/run/x.txt"), "x").unwrap();
    delete(&root, "exports/run").unwrap();
    assert!(!root.join("exports/run").exists());

    assert!(matches!(delete(&root, "."), Err(WorkspaceError::AccessDenied(_))));
}
