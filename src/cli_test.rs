use super::*;

#[test]
fn format_flag_wins_over_extension() {
    assert_eq!(
        parse_format(Some("JPEG"), Some(Path::new("out.png"))),
        OutputFormat::Image(ExportFormat::Jpeg)
    );
    assert_eq!(parse_format(Some("pcp"), None), OutputFormat::Project);
}

#[test]
fn format_falls_back_to_extension_then_png() {
    assert_eq!(
        parse_format(None, Some(Path::new("flat.jpg"))),
        OutputFormat::Image(ExportFormat::Jpeg)
    );
    assert_eq!(parse_format(None, Some(Path::new("saved.pcp"))), OutputFormat::Project);
    assert_eq!(parse_format(None, None), OutputFormat::Image(ExportFormat::Png));
    assert_eq!(parse_format(Some("bmp"), None), OutputFormat::Image(ExportFormat::Png));
}

#[test]
fn explicit_output_path_is_used_verbatim() {
    let out = build_output_path(
        Path::new("in/a.pcp"),
        Some(Path::new("x/y.png")),
        Some(Path::new("ignored")),
        OutputFormat::Image(ExportFormat::Png),
    );
    assert_eq!(out, Some(PathBuf::from("x/y.png")));
}

#[test]
fn output_dir_keeps_input_stem() {
    let out = build_output_path(
        Path::new("in/a.pcp"),
        None,
        Some(Path::new("out")),
        OutputFormat::Image(ExportFormat::Jpeg),
    );
    assert_eq!(out, Some(PathBuf::from("out/a.jpg")));
}

#[test]
fn fallback_avoids_overwriting_input() {
    let out = build_output_path(Path::new("in/a.png"), None, None, OutputFormat::Image(ExportFormat::Png));
    assert_eq!(out, Some(PathBuf::from("in/a_out.png")));

    let out = build_output_path(Path::new("in/a.png"), None, None, OutputFormat::Project);
    assert_eq!(out, Some(PathBuf::from("in/a.pcp")));
}

#[test]
fn literal_paths_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("one.png");
    std::fs::write(&file, b"x").unwrap();
    let pattern = file.to_string_lossy().into_owned();
    let inputs = resolve_inputs(&[pattern.clone(), pattern]);
    assert_eq!(inputs, vec![file]);
}

#[test]
fn glob_patterns_expand() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.pcp", "b.pcp", "c.png"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    let pattern = dir.path().join("*.pcp").to_string_lossy().into_owned();
    let mut inputs = resolve_inputs(&[pattern]);
    inputs.sort();
    assert_eq!(inputs, vec![dir.path().join("a.pcp"), dir.path().join("b.pcp")]);
}

#[test]
fn run_one_converts_image_to_project() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src.png");
    image::RgbaImage::new(3, 3).save(&input).unwrap();
    let output = dir.path().join("src.pcp");

    run_one(&input, &output, OutputFormat::Project, ExportOptions::default()).unwrap();
    let stack = crate::io::load_project(&output).unwrap();
    assert_eq!((stack.width, stack.height), (3, 3));
}

#[test]
fn cli_args_parse() {
    let args = CliArgs::try_parse_from(["paintcore", "-i", "a.pcp", "b.pcp", "--scale", "0.5", "--transparent"]).unwrap();
    assert_eq!(args.input, vec!["a.pcp", "b.pcp"]);
    assert_eq!(args.scale, Some(0.5));
    assert!(args.transparent);
    assert!(CliArgs::try_parse_from(["paintcore"]).is_err());
}

// =============================================================
// Whole runs
// =============================================================

fn args(list: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("paintcore").chain(list.iter().copied())).unwrap()
}

#[test]
fn run_uses_given_settings_for_export() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src.png");
    image::RgbaImage::new(4, 2).save(&input).unwrap();
    let output = dir.path().join("flat.png");

    let settings = EngineSettings { export_scale: 2.0, export_transparent: true, ..EngineSettings::default() };
    let (inp, out) = (input.to_string_lossy().into_owned(), output.to_string_lossy().into_owned());
    let code = run_with_settings(args(&["-i", inp.as_str(), "-o", out.as_str()]), &settings);
    assert_eq!(code, ExitCode::SUCCESS);
    let out = image::open(&output).unwrap().to_rgba8();
    assert_eq!(out.dimensions(), (8, 4));
    assert_eq!(out.get_pixel(0, 0)[3], 0);
}

#[test]
fn run_fails_cleanly_on_oversized_scale() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src.png");
    image::RgbaImage::new(100, 100).save(&input).unwrap();
    let output = dir.path().join("huge.png");

    let (inp, out) = (input.to_string_lossy().into_owned(), output.to_string_lossy().into_owned());
    let code = run_with_settings(
        args(&["-i", inp.as_str(), "-o", out.as_str(), "--scale", "100000000"]),
        &EngineSettings::default(),
    );
    assert_eq!(code, ExitCode::FAILURE);
    assert!(!output.exists());
}
