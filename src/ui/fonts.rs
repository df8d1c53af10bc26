use egui::FontDefinitions;
use std::borrow::Cow;

// CJK first, then generic fallbacks.
const PREFERRED_FAMILIES: [&str; 14] = [
    "Microsoft YaHei",
    "PingFang SC",
    "Noto Sans CJK SC",
    "WenQuanYi Zen Hei",
    "Yu Gothic",
    "Hiragino Sans",
    "Noto Sans CJK JP",
    "Malgun Gothic",
    "Apple SD Gothic Neo",
    "Noto Sans CJK KR",
    "Arial",
    "Helvetica",
    "Cantarell",
    "Ubuntu",
];

/// Appends every preferred family found on the system as a proportional
/// fallback. Returns how many were loaded.
pub fn install_system_fonts(ctx: &egui::Context) -> usize {
    let mut fonts = FontDefinitions::default();
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let mut loaded = 0;
    for family in PREFERRED_FAMILIES {
        let Some(data) = load_family(&db, family) else {
            continue;
        };
        let name = format!("system-{}", family.to_lowercase().replace(' ', "_"));
        fonts
            .font_data
            .insert(name.clone(), egui::FontData::from_owned(data.into_owned()).into());
        fonts
            .families
            .entry(egui::FontFamily::Proportional)
            .or_default()
            .push(name);
        tracing::info!("Loaded system font: {}", family);
        loaded += 1;
    }

    if loaded == 0 {
        tracing::warn!("No preferred CJK or fallback fonts found. Default fonts will be used.");
    }
    ctx.set_fonts(fonts);
    loaded
}

fn load_family(db: &fontdb::Database, family: &str) -> Option<Cow<'static, [u8]>> {
    let query = fontdb::Query {
        families: &[fontdb::Family::Name(family)],
        ..Default::default()
    };
    let id = db.query(&query)?;
    let (source, _) = db.face_source(id)?;
    match source {
        fontdb::Source::Binary(data) => Some(Cow::Owned(data.as_ref().as_ref().to_vec())),
        fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => {
            std::fs::read(path).ok().map(Cow::Owned)
        }
    }
}
