//! Prompt construction for product descriptions.
//!
//! The system instruction asks the model for a marketplace (Ozon/Wildberries)
//! sales description produced with Chain-of-Verification: a base draft, up to
//! three verification questions checked against the supplied details, then a
//! final structured answer within a 1500 character budget.

use crate::models::{ChatMessage, CompletionOptions, CompletionRequest, Role};

pub const COMPLETION_TEMPERATURE: f64 = 0.3;
pub const MAX_TOKENS: u32 = 6000;

const SYSTEM_TEMPLATE: &str = r#"Роль модели: маркетолог и контент-редактор маркетплейсов (Ozon/Wildberries).
Задача: по заданному запросу пользователя разработать продающее описание товара.
Название товара: {product_name}
Характеристики товара: {product_info}
Требования к описанию:
- Название товара (четко выражает уникальность и полезность)
-Описание товара (5–7 предложений, подробно объясняющих функции, удобство использования и привлекательность товара для покупателя)
- Преимущества товара (не менее трех уникальных ценностей, направленных на удовлетворение нужд покупателей)
-Характеристики (таблица или список важных параметров)
-Ключевые слова для SEO (перечень поисковых запросов, которые используют потенциальные покупатели, чтобы найти этот товар)

Тон: позитивный, информативный, продающий, с упором на выгоду.
Максимальное количество символов: 1500.

Инструкция:
Выполни задачу в соответствии с подходом Chain-of-Verification:

Этап 1: Генерация базового ответа.

Этап 2: Верификация.
Чтобы проверить факты из базового ответа сгенерируй до 3 проверочных вопросов и ответь на каждый из них, сравнивая их с исходными данными о продукте. Вопросы должны касаться ключевых характеристик.
Примеры вопросов:
"Точно ли указанный объем емкости для воды 5 литров?"
"Упомянут ли метод естественного испарения в методах фильтрации?"

Этап 3: Создание финального ответа.
На основе результатов верификации отредактируй и улучши базовый ответ. 

Формат ответа:
1) Чеклист верификации 
2) Итог — структурированный вывод в формате:
**Название товара:** ...
**Описание (5–7 предложений):** ...
**Преимущества:**
- ...
- ...
- ...
**Характеристики:**
- параметр: значение
**SEO-ключевые слова:** ключ1, ключ2, ...

В ответе кратко покажи чеклист верификации и итог.
"#;

/// Render the system instruction for one product.
///
/// Both placeholders are substituted in a single pass so that braces inside
/// user text are never reinterpreted.
pub fn system_instruction(product_name: &str, product_info: &str) -> String {
    let mut out = String::with_capacity(SYSTEM_TEMPLATE.len() + product_name.len() + product_info.len());
    let mut rest = SYSTEM_TEMPLATE;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{product_name}") {
            out.push_str(product_name);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{product_info}") {
            out.push_str(product_info);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Short user-role restatement of the request: `"name: info"`
pub fn user_restatement(product_name: &str, product_info: &str) -> String {
    format!("{product_name}: {product_info}")
}

pub fn build_request(model_uri: &str, product_name: &str, product_info: &str) -> CompletionRequest {
    CompletionRequest {
        model_uri: model_uri.to_string(),
        completion_options: CompletionOptions {
            stream: false,
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: MAX_TOKENS,
        },
        messages: vec![
            ChatMessage {
                role: Role::System,
                text: system_instruction(product_name, product_info),
            },
            ChatMessage {
                role: Role::User,
                text: user_restatement(product_name, product_info),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_instruction_embeds_product() {
        let text = system_instruction("Термокружка", "объём 500мл, нержавеющая сталь");
        assert!(text.contains("Название товара: Термокружка\n"));
        assert!(text.contains("Характеристики товара: объём 500мл, нержавеющая сталь\n"));
        assert!(!text.contains("{product_name}"));
        assert!(!text.contains("{product_info}"));
        assert!(text.contains("Chain-of-Verification"));
    }

    #[test]
    fn test_placeholders_in_user_text_are_not_expanded() {
        let text = system_instruction("{product_info}", "{x}");
        assert!(text.contains("Название товара: {product_info}\n"));
        assert!(text.contains("Характеристики товара: {x}\n"));
    }

    #[test]
    fn test_build_request_shape() {
        let req = build_request("gpt://b1g/yandexgpt/latest", "Лампа", "LED, 10 Вт");
        assert_eq!(req.model_uri, "gpt://b1g/yandexgpt/latest");
        assert!(!req.completion_options.stream);
        assert_eq!(req.completion_options.temperature, COMPLETION_TEMPERATURE);
        assert_eq!(req.completion_options.max_tokens, MAX_TOKENS);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.messages[1].text, "Лампа: LED, 10 Вт");
    }

    #[test]
    fn test_temperature_is_exact_in_wire_and_trace_forms() {
        let req = build_request("m", "a", "b");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["completionOptions"]["temperature"], serde_json::json!(0.3));
        let body = serde_json::to_string(&req).unwrap();
        assert!(body.contains(r#""temperature":0.3,"#), "{body}");
    }

    #[test]
    fn test_template_keeps_deployed_wording() {
        let text = system_instruction("n", "i");
        assert!(text.contains("\n-Описание товара (5–7 предложений,"));
        assert!(text.contains("\n- Преимущества товара ("));
        assert!(text.contains("\n-Характеристики (таблица или список"));
        assert!(text.contains("\n-Ключевые слова для SEO ("));
        assert!(text.contains("улучши базовый ответ. \n"));
        assert!(text.contains("\n1) Чеклист верификации \n"));
    }
}
