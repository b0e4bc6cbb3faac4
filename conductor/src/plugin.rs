use crate::conductor::{Conductor, RunArgs};

/// Menu a plugin action is filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuEntry {
    pub path: &'static str,
    pub label: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginInfo {
    pub menu: MenuEntry,
    pub path: &'static str,
    /// Action the entry is listed in front of, when the host has it.
    pub before_action: Option<&'static str>,
    pub label: &'static str,
    pub description: &'static str,
    pub module: &'static str,
}

/// An action a host can list and trigger.
pub trait Plugin {
    fn describe(&self) -> PluginInfo;
    /// Returns the host status code.
    fn run(&self, args: RunArgs) -> i32;
}

impl Plugin for Conductor<'_> {
    fn describe(&self) -> PluginInfo {
        PluginInfo {
            menu: MenuEntry {
                path: "placeAndRoute",
                label: "P&R",
            },
            path: "misc.alpha.conductor",
            before_action: Some("placeAndRoute.conductor"),
            label: "P&R Conductor",
            description: "Perform a placement driven by global routing, then detailed routing",
            module: module_path!(),
        }
    }

    fn run(&self, args: RunArgs) -> i32 {
        self.execute(args).status
    }
}
