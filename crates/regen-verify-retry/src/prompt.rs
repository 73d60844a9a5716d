use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Style of modification requested from the generator, mildest first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    #[default]
    LightTexture,
    NewBackground,
    StrongLighting,
}

#[derive(Debug)]
pub struct TemplateInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub emphasis: &'static str,
}

const TEMPLATES: [TemplateInfo; 3] = [
    TemplateInfo {
        name: "light_texture",
        description: "Subtle adjustments with light texture variations",
        emphasis: "minimal changes, preserve original style",
    },
    TemplateInfo {
        name: "new_background",
        description: "Complete background replacement with new setting",
        emphasis: "dramatic background change, maintain product identity",
    },
    TemplateInfo {
        name: "strong_lighting",
        description: "Dramatic lighting changes and shadow adjustments",
        emphasis: "creative lighting, high contrast, professional photography style",
    },
];

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 3] = [
        PromptTemplate::LightTexture,
        PromptTemplate::NewBackground,
        PromptTemplate::StrongLighting,
    ];

    pub fn info(&self) -> &'static TemplateInfo {
        match self {
            PromptTemplate::LightTexture => &TEMPLATES[0],
            PromptTemplate::NewBackground => &TEMPLATES[1],
            PromptTemplate::StrongLighting => &TEMPLATES[2],
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.info().name
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct PromptTemplateParseError(pub String);

impl fmt::Display for PromptTemplateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown prompt template '{}'", self.0)
    }
}

impl std::error::Error for PromptTemplateParseError {}

impl FromStr for PromptTemplate {
    type Err = PromptTemplateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('-', "_");
        PromptTemplate::ALL
            .into_iter()
            .find(|template| template.as_str() == lower)
            .ok_or(PromptTemplateParseError(lower))
    }
}

fn intensity(level: f64, low: &'static str, mid: &'static str, high: &'static str) -> &'static str {
    if level < 50.0 {
        low
    } else if level < 75.0 {
        mid
    } else {
        high
    }
}

/// Builds the instruction text handed to the generator. The product itself
/// must survive; only background and lighting may change.
pub fn render_prompt(
    template: PromptTemplate,
    description: &str,
    modification_level: f64,
    logo_text: &str,
) -> String {
    let info = template.info();
    let background = intensity(modification_level, "subtle", "moderate", "dramatic");
    let lighting = intensity(modification_level, "minimal", "noticeable", "creative");
    let logo = logo_text.trim();
    let logo_section = if logo.is_empty() {
        "3. Logo removal:\n   - Remove every existing logo and brand text\n   - Keep the product surface clean and generic".to_string()
    } else {
        format!(
            "3. Logo replacement:\n   - Remove every existing logo from the product\n   - Add \"{logo}\" as the new logo\n   - Keep it high-contrast and readable"
        )
    };

    format!(
        "Edit the image minimally and keep the product unchanged.\n\
         \n\
         Template: {description_line}\n\
         Emphasis: {emphasis}\n\
         \n\
         1. Product preservation:\n   \
         - Keep the exact container, packaging and design elements\n   \
         - Keep product dimensions and proportions\n   \
         - Only the background environment and lighting may change\n\
         \n\
         2. Modification focus:\n   \
         - {emphasis}\n   \
         - Background changes allowed: {background}\n   \
         - Lighting adjustments allowed: {lighting}\n\
         \n\
         {logo_section}\n\
         \n\
         Reference description: \"{description}\"\n\
         \n\
         Output: the same product with {emphasis}",
        description_line = info.description,
        emphasis = info.emphasis,
    )
}
