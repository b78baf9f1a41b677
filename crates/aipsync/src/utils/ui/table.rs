use tabled::{
    Table, Tabled,
    settings::{Panel, Remove, Style, object::Rows},
};

pub struct Formatter;

#[derive(Debug, Clone, Default)]
pub struct FormatConfig {
    pub header:      Option<String>,
    pub footer:      Option<String>,
    pub hide_titles: bool,
}

impl Formatter {
    pub fn default<T: Tabled>(data: impl IntoIterator<Item = T>, config: FormatConfig) -> Table {
        let mut table = Table::new(data);

        if config.hide_titles {
            table.with(Remove::row(Rows::first()));
        }
        if let Some(header) = config.header {
            table.with(Panel::header(header));
        }
        if let Some(footer) = config.footer {
            table.with(Panel::footer(footer));
        }

        table.with(Style::blank());
        table
    }
}
