pub mod click_record;

pub use click_record::Entity as ClickRecordEntity;
