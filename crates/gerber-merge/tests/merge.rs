use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use gerber_merge::geometry::BBox;
use gerber_merge::parsers::excellon::ExcellonDocument;
use gerber_merge::parsers::gerber::GerberDocument;
use gerber_merge::{Board, LayerRole, MergeError};

const OUTLINE: &str = "\
G04 outline*
%MOMM*%
%FSTAX33Y33*%
%ADD10C,0.100*%
D10*
X10000Y20000D02*
X110000Y20000D01*
X110000Y70000D01*
X10000Y70000D01*
X10000Y20000D01*
M02*
";

const COPPER: &str = "\
G04 copper*
G75*
%MOMM*%
%FSTAX33Y33*%
%LPD*%
%ADD10C,0.250*%
%ADD11R,1.000X2.000*%
G01*
D10*
X20000Y30000D02*
X60000Y30000D01*
D11*
X50000Y50000D03*
G36*
X30000Y40000D02*
X40000Y40000D01*
X40000Y45000D01*
G37*
M02*
";

const SILK: &str = "\
%MOMM*%
%FSTAX33Y33*%
%ADD10C,0.150*%
D10*
X20000Y25000D02*
X120000Y25000D01*
M02*
";

const DRILL: &str = "\
M48
FMAT,2
ICI,OFF
METRIC,TZ,000.000
T1C0.800
%
G90
M71
T1
X20000Y30000
X60000Y30000
M30
";

fn write_board(dir: &Path) {
    fs::write(dir.join("demo.GKO"), OUTLINE).unwrap();
    fs::write(dir.join("demo.GTL"), COPPER).unwrap();
    fs::write(dir.join("demo.gto"), SILK).unwrap();
    fs::write(dir.join("demo.XLN"), DRILL).unwrap();
    fs::write(dir.join("README.txt"), "not a layer").unwrap();
}

#[test]
fn test_load_reconcile_rotate_save() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_board(input.path());

    let mut board = Board::load(input.path()).unwrap();
    assert_eq!(
        board.layers.keys().copied().collect::<Vec<_>>(),
        vec![
            LayerRole::CopperTop,
            LayerRole::SilkTop,
            LayerRole::Outline,
            LayerRole::Holes
        ]
    );

    let report = board.reconcile().unwrap();
    assert!(!report.padded);
    assert_eq!(report.bbox, BBox::new(10.0, 20.0, 110.0, 70.0));
    assert_eq!(report.out_of_bounds, vec![LayerRole::SilkTop]);
    assert_eq!(report.clipped[0].points, 1);
    assert_eq!(board.bbox, Some(BBox::new(0.0, 0.0, 100.0, 50.0)));

    board.rotate90ccw();
    assert_eq!(board.bbox, Some(BBox::new(0.0, 0.0, 50.0, 100.0)));

    let prefix = output.path().join("panel");
    let written = board.save(&prefix).unwrap();
    assert_eq!(written.len(), 4);
    assert!(output.path().join("panel.GTL").is_file());
    assert!(output.path().join("panel.GTO").is_file());

    let outline = GerberDocument::from_path(&output.path().join("panel.GKO")).unwrap();
    assert_eq!(outline.bbox, Some(BBox::new(0.0, 0.0, 50.0, 100.0)));

    let copper = GerberDocument::from_path(&output.path().join("panel.GTL")).unwrap();
    assert_eq!(copper.aperture_descriptors.len(), 2);
    assert_eq!(copper.extra_params[0].code, "LP");
    let modes: Vec<&str> = copper.layers.iter().map(|l| l.mode.as_str()).collect();
    assert_eq!(modes, vec!["D10", "D11", "G36", "G37"]);
    // (20, 30) -> normalized (10, 10) -> rotated (-10, 10) -> shifted (40, 10)
    assert_abs_diff_eq!(copper.layers[0].events[0].x, 40.0, epsilon = 1e-9);
    assert_abs_diff_eq!(copper.layers[0].events[0].y, 10.0, epsilon = 1e-9);

    // the clamped silk point sits on the rotated outline edge
    let silk = GerberDocument::from_path(&output.path().join("panel.GTO")).unwrap();
    assert_abs_diff_eq!(silk.layers[0].events[1].y, 100.0, epsilon = 1e-9);

    let drill = ExcellonDocument::from_path(&output.path().join("panel.XLN")).unwrap();
    assert_eq!(drill.point_count(), 2);
    assert_abs_diff_eq!(drill.holes[0].holes[0].x, 40.0, epsilon = 1e-9);
    assert_abs_diff_eq!(drill.holes[0].holes[1].y, 50.0, epsilon = 1e-9);
}

const FINE_OUTLINE: &str = "\
%MOMM*%
%FSTAX33Y33*%
%ADD10C,0.100*%
D10*
X10001Y20003D02*
X110007Y20003D01*
X110007Y70009D01*
X10001Y70009D01*
X10001Y20003D01*
M02*
";

const FINE_COPPER: &str = "\
%MOMM*%
%FSTAX33Y33*%
%ADD10C,0.250*%
D10*
X15007Y30011D02*
X60013Y30011D01*
X33333Y66667D03*
M02*
";

const FINE_DRILL: &str = "\
M48
METRIC,TZ,000.000
T1C0.800
%
T1
X20101Y30303
X99999Y69997
M30
";

fn read_layers(dir: &Path, prefix: &str) -> Vec<String> {
    [".GTL", ".GKO", ".XLN"]
        .iter()
        .map(|ext| fs::read_to_string(dir.join(format!("{prefix}{ext}"))).unwrap())
        .collect()
}

#[test]
fn test_saved_board_reloads_unchanged() {
    let input = tempfile::tempdir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    fs::write(input.path().join("fine.GKO"), FINE_OUTLINE).unwrap();
    fs::write(input.path().join("fine.GTL"), FINE_COPPER).unwrap();
    fs::write(input.path().join("fine.XLN"), FINE_DRILL).unwrap();

    let mut board = Board::load(input.path()).unwrap();
    board.reconcile().unwrap();
    board.save(&first.path().join("once")).unwrap();

    let once = read_layers(first.path(), "once");
    // (15.007, 30.011) less the outline corner (10.001, 20.003)
    assert!(once[0].contains("\nX5006Y10008D02*\n"), "{}", once[0]);
    assert!(once[2].contains("\nX10100Y10300\nX89998Y49994\n"), "{}", once[2]);

    let mut again = Board::load(first.path()).unwrap();
    let report = again.reconcile().unwrap();
    assert!(report.out_of_bounds.is_empty());
    assert!(report.clipped.is_empty());
    again.save(&second.path().join("twice")).unwrap();
    assert_eq!(read_layers(second.path(), "twice"), once);
}

#[test]
fn test_board_without_outline_is_padded() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("demo.GTL"), COPPER).unwrap();

    let mut board = Board::load(input.path()).unwrap();
    let report = board.reconcile().unwrap();
    assert!(report.padded);
    // copper spans (20, 30)..(60, 50)
    assert_eq!(report.bbox, BBox::new(15.0, 25.0, 65.0, 55.0));
    assert_eq!(board.bbox, Some(BBox::new(0.0, 0.0, 50.0, 30.0)));
}

#[test]
fn test_bad_file_fails_board() {
    let input = tempfile::tempdir().unwrap();
    write_board(input.path());
    fs::write(input.path().join("demo.GBL"), "%MOMM*%\n%FSTAX33Y33*%\nG02*\n").unwrap();

    let err = Board::load(input.path()).unwrap_err();
    match err {
        MergeError::File { path, source } => {
            assert!(path.ends_with("demo.GBL"));
            assert!(matches!(*source, MergeError::UnknownToken { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}
