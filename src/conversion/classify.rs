/// Name fragments that mark a displacement/height texture
pub const DISPLACEMENT_TAGS: [&str; 5] = ["dsp", "disp", "displacement", "zdisp", "height"];

/// Name fragments that mark a color (sRGB-encoded) texture
pub const COLOR_TAGS: [&str; 5] = ["srgb", "basecolor", "albedo", "color", "diffuse"];

/// How a texture should be treated by the converter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextureClass {
    pub color_managed: bool,
    pub displacement: bool,
}

fn contains_any(name: &str, tags: &[&str]) -> bool {
    let lower = name.to_lowercase();
    tags.iter().any(|tag| lower.contains(tag))
}

pub fn is_displacement(file_name: &str) -> bool {
    contains_any(file_name, &DISPLACEMENT_TAGS)
}

/// Displacement always wins: a `height_albedo` map is not color managed
pub fn is_color_managed(file_name: &str) -> bool {
    !is_displacement(file_name) && contains_any(file_name, &COLOR_TAGS)
}

pub fn classify(file_name: &str) -> TextureClass {
    TextureClass {
        color_managed: is_color_managed(file_name),
        displacement: is_displacement(file_name),
    }
}
