// Route discovery across a controller directory

use crate::container::Container;
use crate::finder::ControllerFinder;
use crate::logging::{debug, warn};
use crate::route::{self, RouteRecord};
use crate::route_parser::RouteParser;
use crate::Result;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct RouteDiscoverer {
    directory: Option<PathBuf>,
    finder: ControllerFinder,
    parser: RouteParser,
}

impl RouteDiscoverer {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            finder: ControllerFinder::new(),
            parser: RouteParser::new(),
        }
    }

    pub fn directory(&self) -> Option<&PathBuf> {
        self.directory.as_ref()
    }

    /// Parse every controller found under the directory, in scan order.
    ///
    /// A path already claimed by an earlier record is dropped.
    pub fn discover(&self, container: &Container) -> Result<Vec<RouteRecord>> {
        let Some(classes) = self.finder.find(self.directory.as_deref())? else {
            debug!("No controller directory, route table is empty");
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut table = Vec::new();
        for class in &classes {
            for record in self.parser.parse(container, class)? {
                if !seen.insert(route::normalize(&record.path)) {
                    warn!(
                        path = %record.path,
                        class = %record.class,
                        method = %record.method,
                        "Path already routed, dropping later declaration"
                    );
                    continue;
                }
                table.push(record);
            }
        }

        debug!(controllers = classes.len(), routes = table.len(), "Route discovery complete");
        Ok(table)
    }
}
