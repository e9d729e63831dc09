use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};

use crate::analytics::ClickRecord;
use crate::services::enrichment::EnrichedAttributes;
use migration::entities::click_record;

/// 将 ClickRecord 转换为 ActiveModel（id 由数据库生成）
pub fn record_to_active_model(
    record: &ClickRecord,
    created_at: DateTime<Utc>,
) -> click_record::ActiveModel {
    click_record::ActiveModel {
        id: NotSet,
        url_id: Set(record.url_id.clone()),
        ip_address: Set(record.ip_address.clone()),
        user_agent: Set(record.user_agent.clone()),
        referrer: Set(record.referrer.clone()),
        country: Set(record.attributes.country.clone()),
        city: Set(record.attributes.city.clone()),
        browser: Set(record.attributes.browser.clone()),
        os: Set(record.attributes.os.clone()),
        device_type: Set(record.attributes.device_class.clone()),
        utm_source: Set(record.utm_source.clone()),
        utm_medium: Set(record.utm_medium.clone()),
        utm_campaign: Set(record.utm_campaign.clone()),
        is_unique: Set(record.is_unique),
        visited_at: Set(record.visited_at),
        idempotency_key: Set(record.idempotency_key.clone()),
        created_at: Set(created_at),
    }
}

/// 将 Sea-ORM Model 转换为 ClickRecord（region 不落库）
pub fn model_to_record(model: click_record::Model) -> ClickRecord {
    ClickRecord {
        url_id: model.url_id,
        ip_address: model.ip_address,
        user_agent: model.user_agent,
        referrer: model.referrer,
        utm_source: model.utm_source,
        utm_medium: model.utm_medium,
        utm_campaign: model.utm_campaign,
        attributes: EnrichedAttributes {
            country: model.country,
            city: model.city,
            browser: model.browser,
            os: model.os,
            device_class: model.device_type,
            ..EnrichedAttributes::unknown()
        },
        is_unique: model.is_unique,
        visited_at: model.visited_at,
        idempotency_key: model.idempotency_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::ClickEvent;
    use sea_orm::ActiveValue;

    #[test]
    fn test_record_to_active_model_maps_device_class() {
        let event = ClickEvent::new("abc", "1.2.3.4").with_referrer("https://t.co/");
        let attrs = EnrichedAttributes {
            device_class: "Mobile".to_string(),
            ..EnrichedAttributes::unknown()
        };
        let record = ClickRecord::from_event(&event, attrs, false).with_idempotency_key("job-1");

        let model = record_to_active_model(&record, Utc::now());
        assert!(matches!(model.id, ActiveValue::NotSet));
        assert_eq!(model.device_type, Set("Mobile".to_string()));
        assert_eq!(model.is_unique, Set(false));
        assert_eq!(model.referrer, Set(Some("https://t.co/".to_string())));
        assert_eq!(model.idempotency_key, Set(Some("job-1".to_string())));
    }
}
