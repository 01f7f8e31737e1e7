use anyhow::{Context, Result};
use recent_pins::{
    identifier::DurableId,
    persistence::{FilePreferences, Namespace, PersistenceIndex},
    scope::Scope,
};

pub fn scopes(prefs: &FilePreferences, namespace: Namespace) -> Result<()> {
    let index = PersistenceIndex::open(prefs, namespace)?;
    if index.is_empty() {
        eprintln!("no scopes recorded under {}", index.namespace());
        return Ok(());
    }

    for scope in index.scopes() {
        let (pinned, history) = index.load(scope);
        println!("{}\t{} pinned\t{} history", scope, pinned.len(), history.len());
    }
    Ok(())
}

pub fn show(prefs: &FilePreferences, namespace: Namespace, scope: &str) -> Result<()> {
    let scope = Scope::parse_key(scope)?;
    let index = PersistenceIndex::open(prefs, namespace)?;
    let (pinned, history) = index.load(&scope);

    println!("pinned:");
    for id in &pinned {
        println!("  {}", id);
    }
    println!("history:");
    for id in &history {
        println!("  {}", id);
    }
    Ok(())
}

pub fn forget(prefs: &FilePreferences, namespace: Namespace, scope: &str) -> Result<()> {
    let scope = Scope::parse_key(scope)?;
    let mut index = PersistenceIndex::open(prefs, namespace)?;
    if !index.delete(&scope) {
        eprintln!("scope {} was not recorded", scope);
    }
    index.flush(prefs)
}

pub fn clear(prefs: &FilePreferences, namespace: Namespace) -> Result<()> {
    let mut index = PersistenceIndex::open(prefs, namespace)?;
    let count = index.len();
    index.clear_all(prefs)?;
    eprintln!("forgot {} scopes", count);
    Ok(())
}

pub fn dump(prefs: &FilePreferences, namespace: Namespace, json: bool) -> Result<()> {
    let index = PersistenceIndex::open(prefs, namespace)?;
    let snapshot = index.snapshot();
    let out = if json {
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize index as JSON")?
    } else {
        serde_yaml::to_string(&snapshot).context("Failed to serialize index as YAML")?
    };
    println!("{}", out);
    Ok(())
}

pub fn parse(id: &str) -> Result<()> {
    let id = DurableId::parse(id)?;
    println!("kind:        {:?}", id.kind());
    println!("container:   {}", id.container());
    println!("item id:     {}", id.item_id());
    println!("instance id: {}", id.instance_id());
    if id.instance_id() != 0 {
        println!("unpacked:    {}", id.unpacked());
    }
    Ok(())
}
