use std::sync::OnceLock;

use regex::Regex;

/// Label for paths outside the metadata tree or with an unmapped folder.
pub const UNKNOWN_COMPONENT: &str = "Unknown";

fn metadata_folder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/force-app/main/default/(\w+)/").expect("component pattern is valid")
    })
}

/// Classify a changed path by the metadata folder directly under
/// `force-app/main/default/`. Matching is case-sensitive.
pub fn component_type(path: &str) -> &'static str {
    metadata_folder()
        .captures(path)
        .and_then(|caps| caps.get(1))
        .and_then(|folder| label_for_folder(folder.as_str()))
        .unwrap_or(UNKNOWN_COMPONENT)
}

fn label_for_folder(folder: &str) -> Option<&'static str> {
    let label = match folder {
        "analyticSnapshots" => "Analytic Snapshot",
        "applications" => "App Menu",
        "appMenus" => "App Menu",
        "approvalProcesses" => "Approval Process",
        "assignmentRules" => "Assignment Rule",
        "aura" => "Aura Definition Bundle",
        "classes" => "Apex Class",
        "communities" => "Community",
        "components" => "Apex Component",
        "connectedApps" => "Connected App",
        "contentassets" => "Content Asset",
        "customHelpMenuSections" => "Custom Help Menu Section",
        "customMetadata" => "Custom Metadata",
        "customPermissions" => "Custom Permission",
        "duplicateRules" => "Duplicate Rule",
        "email" => "Email Template",
        "flexipages" => "Flexi Page",
        "flows" => "Flow",
        "globalValueSets" => "Global Value Set",
        "globalValueSetTranslations" => "Global Value Set Translation",
        "groups" => "Group",
        "homePageComponents" => "Home Page Component",
        "homePageLayouts" => "Home Page Layout",
        "labels" => "Label",
        "layouts" => "Layout",
        "LeadConvertSettings" => "Lead Convert Settings",
        "letterhead" => "Letterhead",
        "lwc" => "Lightning Component Bundle",
        "matchingRules" => "Matching Rule",
        "messageChannels" => "Message Channel",
        "mutingpermissionsets" => "Muting Permission Set",
        "objects" => "Custom Object",
        "objectTranslations" => "Object Translation",
        "pages" => "Apex Page",
        "pathAssistants" => "Path Assistant",
        "permissionsetgroups" => "Permission Set Group",
        "permissionsets" => "Permission Set",
        "platformEventChannelMembers" => "Platform Event Channel Member",
        "platformEventChannels" => "Platform Event Channel",
        "profiles" => "Profile",
        "queues" => "Queue",
        "quickActions" => "Quick Action",
        "remoteSiteSettings" => "Remote Site Setting",
        "reports" => "Report",
        "reportTypes" => "Report Type",
        "roles" => "Role",
        "settings" => "Settings",
        "sharingRules" => "Sharing Rules",
        "standardValueSets" => "Standard Value Set",
        "standardValueSetTranslations" => "Standard Value Set Translation",
        "staticresources" => "Static Resource",
        "surveySettings" => "Survey Settings",
        "tabs" => "Custom Tab",
        "translations" => "Translation",
        "triggers" => "Apex Trigger",
        "weblinks" => "Web Link",
        "workflows" => "Workflow",
        _ => return None,
    };
    Some(label)
}
