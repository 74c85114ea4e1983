//! Weft - Incremental Template Rendering
//!
//! Weft renders markup templates made of static chunks and dynamic values
//! into an arena-backed tree. The static chunks compile once; every later
//! render of the same template reuses the compiled form and rewrites only
//! the bindings whose values changed.
//!
//! ```
//! use weft::{html, Dom, Engine, RenderOptions, Strings, Value};
//!
//! let mut engine = Engine::new();
//! let mut dom = Dom::new();
//! let container = dom.create_element("main");
//!
//! let strings = Strings::new(["<p>count: ", "</p>"]);
//! for count in 0..3 {
//!     let view = html(strings.clone(), vec![Value::from(count as i64)]);
//!     engine.render(
//!         &mut dom,
//!         Value::Template(view),
//!         container,
//!         &RenderOptions::default(),
//!     )?;
//! }
//!
//! assert_eq!(dom.text_of(container), "count: 2");
//! # Ok::<(), weft::log::Error>(())
//! ```
mod adjust;
mod cache;
mod compile;
mod directive;
mod dom;
mod engine;
mod instance;
mod marker;
mod part;
mod region;
mod styles;
mod template;
mod value;

pub mod log;

pub use adjust::{insert_node_into_template, remove_nodes_from_template};
pub use cache::{DefaultFactory, TemplateFactory, TemplateId, Templates};
pub use compile::{compile, joined_source, CompiledTemplate, Parser, StaticPart, StaticPartKind};
pub use directive::{directive, Directive, MAX_DIRECTIVE_TURNS};
pub use dom::{Dom, ElementData, Event, ListenerHandle, NodeId, NodeKind, Walk};
pub use engine::{Engine, RenderContext, RenderOptions};
pub use instance::Instance;
pub use marker::Marker;
pub use part::{
    AttributeBinding, AttributeCommitter, BooleanAttributePart, CommitterKind, DefaultProcessor,
    EventPart, NodePart, Part, Processor,
};
pub use region::Region;
pub use styles::remove_styles_from_template;
pub use template::{html, svg, Description, MarkupKind, Strings};
pub use value::{Listener, ListenerOptions, Value};
