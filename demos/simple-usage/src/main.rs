use std::rc::Rc;

use virtual_list_core::builder::{BuildConfig, Builder, ContainerOption, ItemSizeOption, TemplateOutput};
use virtual_list_core::data_manager::Item;

fn items(n: usize) -> Vec<Item<String>> {
    (0..n).map(|idx| Item { id: idx.to_string(), payload: format!("Item {idx}") }).collect()
}

fn main() {
    let document = web_sys::window().expect("no window").document().expect("no document");

    let template = Rc::new(|item: &Item<String>, _index: usize, _state| {
        TemplateOutput::Html(format!("<div class=\"item\">{}</div>", item.payload))
    });

    let mut config = BuildConfig::new(
        ContainerOption::Selector("#list".to_string()),
        ItemSizeOption::Fixed(30.0),
        template,
    );
    config.items = Some(items(100));
    config.class_prefix = "scrollbar".to_string();

    let list = Builder::new(config).expect("invalid config").build(document).expect("failed to mount list");
    let _ = list.total();
}
