// Route extraction from controller metadata

use crate::container::Container;
use crate::logging::{debug, trace};
use crate::route::{self, DEFAULT_ROUTE_NAME, RouteRecord};
use crate::Result;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteParser;

impl RouteParser {
    pub fn new() -> Self {
        Self
    }

    /// Build one record per method-level route on `class_id`.
    ///
    /// Empty when the container cannot resolve the class or the class has no
    /// class-level route. The first method to claim a path keeps it.
    pub fn parse(&self, container: &Container, class_id: &str) -> Result<Vec<RouteRecord>> {
        if !container.has(class_id) {
            debug!(class = class_id, "Controller not resolvable, skipping");
            return Ok(Vec::new());
        }

        let instance = container.get(class_id)?;
        let class = instance.class();
        let Some(prefix) = class.routes.first() else {
            trace!(class = class_id, "No class-level route");
            return Ok(Vec::new());
        };
        let prefix_name = prefix.name.as_deref().unwrap_or(DEFAULT_ROUTE_NAME);

        let mut records: Vec<RouteRecord> = Vec::new();
        for method in container.reflector().public_methods(class) {
            for attribute in &method.routes {
                let path = format!("{}{}", prefix.path, attribute.path);
                let key = route::normalize(&path);
                if records.iter().any(|r| route::normalize(&r.path) == key) {
                    trace!(class = class_id, method = %method.name, path = %path, "Duplicate path dropped");
                    continue;
                }

                let arguments: IndexMap<String, String> = method
                    .params
                    .iter()
                    .filter_map(|p| p.ty.as_ref().map(|ty| (p.name.clone(), ty.to_string())))
                    .collect();

                records.push(RouteRecord {
                    class: class_id.to_string(),
                    method: method.name.clone(),
                    arguments,
                    path,
                    name: format!(
                        "{}_{}",
                        prefix_name,
                        attribute.name.as_deref().unwrap_or(DEFAULT_ROUTE_NAME)
                    ),
                });
            }
        }

        debug!(class = class_id, routes = records.len(), "Parsed controller routes");
        Ok(records)
    }
}
