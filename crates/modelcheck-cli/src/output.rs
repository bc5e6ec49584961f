use modelcheck_common::{
    ListModelDefinitionsResponse, ListModelsResponse, ListVersionsResponse, Model,
    ModelDefinition, Operation, TriggerResponse, WatchResponse,
};
use modelcheck_suite::CheckReport;

fn or_na(v: Option<&str>) -> &str {
    v.unwrap_or("N/A")
}

fn state_str(model: &Model) -> &str {
    model.state.as_ref().map(|s| s.as_str()).unwrap_or("N/A")
}

pub fn print_models(resp: &ListModelsResponse) {
    if resp.models.is_empty() {
        println!("No models found.");
        return;
    }
    println!(
        "{:<24} {:<20} {:<32} {:<24}",
        "ID", "State", "Definition", "Visibility"
    );
    println!("{:-<100}", "");
    for m in &resp.models {
        println!(
            "{:<24} {:<20} {:<32} {:<24}",
            m.id,
            state_str(m),
            or_na(m.model_definition.as_deref()),
            m.visibility.as_ref().map(|v| v.as_str()).unwrap_or("N/A"),
        );
    }
    println!("\nTotal: {}", resp.total_size);
    if !resp.next_page_token.is_empty() {
        println!("Next page token: {}", resp.next_page_token);
    }
}

pub fn print_model_detail(model: &Model) {
    println!("\n=== Model: {} ===", model.id);
    println!("  {:<20} {}", "Name", model.name);
    println!("  {:<20} {}", "UID", or_na(model.uid.as_deref()));
    println!("  {:<20} {}", "State", state_str(model));
    println!("  {:<20} {}", "Task", or_na(model.task.as_deref()));
    println!("  {:<20} {}", "Definition", or_na(model.model_definition.as_deref()));
    println!(
        "  {:<20} {}",
        "Visibility",
        model.visibility.as_ref().map(|v| v.as_str()).unwrap_or("N/A")
    );
    println!("  {:<20} {}", "Owner", or_na(model.owner_name.as_deref()));
    println!("  {:<20} {}", "Description", or_na(model.description.as_deref()));
    println!("  {:<20} {}", "Created", or_na(model.create_time.as_deref()));
    println!("  {:<20} {}", "Updated", or_na(model.update_time.as_deref()));
    if let Some(config) = &model.configuration {
        println!("  {:<20} {}", "Configuration", config);
    }
    println!();
}

pub fn print_versions(resp: &ListVersionsResponse) {
    if resp.versions.is_empty() {
        println!("No versions found.");
        return;
    }
    println!("{:<12} {:<20} {:<60}", "ID", "State", "Name");
    for v in &resp.versions {
        println!(
            "{:<12} {:<20} {:<60}",
            v.id,
            v.state.as_ref().map(|s| s.as_str()).unwrap_or("N/A"),
            v.name
        );
    }
}

pub fn print_operation(op: &Operation) {
    println!("  {:<12} {}", "Name", op.name);
    println!("  {:<12} {}", "Done", op.done);
    if let Some(err) = &op.error {
        println!("  {:<12} {} {}", "Error", err.code, err.message);
    }
    if let Some(name) = op.response_name() {
        println!("  {:<12} {}", "Resource", name);
    }
}

pub fn print_watch(id: &str, watch: &WatchResponse) {
    print!("{id}: {}", watch.state);
    if let Some(p) = watch.progress {
        print!(" ({p}%)");
    }
    if let Some(m) = watch.message.as_deref().filter(|m| !m.is_empty()) {
        print!(" - {m}");
    }
    println!();
}

pub fn print_trigger(resp: &TriggerResponse) {
    println!("Task: {}", or_na(resp.task.as_deref()));
    for (i, out) in resp.task_outputs.iter().enumerate() {
        match out.classification() {
            Some(c) => println!(
                "  [{i}] category={} score={}",
                or_na(c.category.as_deref()),
                c.score.map(|s| format!("{s:.4}")).unwrap_or_else(|| "N/A".to_string())
            ),
            None => println!(
                "  [{i}] {}",
                serde_json::to_string(&out.0).unwrap_or_default()
            ),
        }
    }
}

pub fn print_definitions(resp: &ListModelDefinitionsResponse) {
    println!("{:<16} {:<20} {:<50}", "ID", "Title", "Documentation");
    for d in &resp.model_definitions {
        println!(
            "{:<16} {:<20} {:<50}",
            d.id,
            or_na(d.title.as_deref()),
            or_na(d.documentation_url.as_deref())
        );
    }
    println!("\nTotal: {}", resp.total_size);
}

pub fn print_definition_detail(d: &ModelDefinition) {
    println!("\n=== Model definition: {} ===", d.id);
    println!("  {:<20} {}", "Name", d.name);
    println!("  {:<20} {}", "Title", or_na(d.title.as_deref()));
    println!("  {:<20} {}", "Documentation", or_na(d.documentation_url.as_deref()));
    if let Some(spec) = &d.model_spec {
        println!(
            "  {:<20} {}",
            "Spec",
            serde_json::to_string_pretty(spec).unwrap_or_default()
        );
    }
    println!();
}

pub fn print_report(report: &CheckReport) {
    println!("\n=== Checks ===");
    let mut current = "";
    for r in report.results() {
        if r.group != current {
            println!("\n[{}]", r.group);
            current = r.group.as_str();
        }
        let mark = if r.passed { "✓" } else { "✗" };
        match (&r.detail, r.passed) {
            (Some(detail), false) => println!("  {mark} {} ({detail})", r.name),
            _ => println!("  {mark} {}", r.name),
        }
    }
    println!("\n{report}");
}
