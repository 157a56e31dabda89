use std::fmt;
use std::sync::Arc;

/// Bounding box in viewport pixels.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Mount target the renderer draws into.
pub trait Container: Send + Sync {
    fn id(&self) -> &str;
    fn bounds(&self) -> Rect;
}

/// Host lookup for containers named by id.
pub trait ContainerHost: Send + Sync {
    fn find(&self, id: &str) -> Option<Arc<dyn Container>>;
}

#[derive(Clone)]
pub enum ContainerTarget {
    Element(Arc<dyn Container>),
    Id(String),
}

impl fmt::Debug for ContainerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerTarget::Element(container) => {
                f.debug_tuple("Element").field(&container.id()).finish()
            }
            ContainerTarget::Id(id) => f.debug_tuple("Id").field(id).finish(),
        }
    }
}

impl From<&str> for ContainerTarget {
    fn from(id: &str) -> Self {
        ContainerTarget::Id(id.to_string())
    }
}

impl From<Arc<dyn Container>> for ContainerTarget {
    fn from(container: Arc<dyn Container>) -> Self {
        ContainerTarget::Element(container)
    }
}
