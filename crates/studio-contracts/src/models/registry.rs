use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Image,
    Edit,
    Video,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Edit => "edit",
            Self::Video => "video",
        }
    }
}

/// Parameter dialect a video model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// `resolution` + `aspect_ratio` + `generate_audio`.
    Veo,
    /// `size` in pixels + `seconds`.
    Sora,
    Generic,
}

impl ModelFamily {
    /// Substring match on the id as configured; upstream ids are lowercase.
    pub fn from_model_id(model: &str) -> Self {
        if model.contains("veo3") {
            Self::Veo
        } else if model.contains("sora") {
            Self::Sora
        } else {
            Self::Generic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub family: ModelFamily,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn new(name: &str, capabilities: &[Capability]) -> Self {
        Self {
            name: name.to_string(),
            family: ModelFamily::from_model_id(name),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: Capability) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    use Capability::{Edit, Image, Video};

    let mut map = IndexMap::new();
    for (name, capabilities) in [
        ("nano-banana", &[Image, Edit][..]),
        ("gpt-image-1", &[Image, Edit][..]),
        ("sora-2", &[Video][..]),
        ("sora-2-pro", &[Video][..]),
        ("veo3", &[Video][..]),
        ("veo3-fast", &[Video][..]),
    ] {
        map.insert(name.to_string(), ModelSpec::new(name, capabilities));
    }
    map
}
