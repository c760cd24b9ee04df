//! Conversation loop tests: answer dispatch, persistence and AI corrections

use std::sync::Arc;

use counselor_agent::{
    AgentError, Conversation, ConversationEvent, ConversationOptions, InMemoryProfileStore,
    Progress,
};
use counselor_core::{FieldName, FieldValue, MaritalStatus, Script, Speaker};
use counselor_llm::ScriptedGenerator;
use counselor_text_processing::UpdateOutcome;

struct Harness {
    conversation: Conversation,
    generator: Arc<ScriptedGenerator>,
    store: Arc<InMemoryProfileStore>,
}

fn harness(script: Script, options: ConversationOptions) -> Harness {
    let generator = Arc::new(ScriptedGenerator::new(script.clone()));
    let store = Arc::new(InMemoryProfileStore::new());
    let conversation = Conversation::new(script, generator.clone(), store.clone(), options);
    Harness {
        conversation,
        generator,
        store,
    }
}

fn correction(field: &str, old: &str, new: &str) -> String {
    format!(
        "Claro, lo corrijo.\n[ACTUALIZAR_CAMPO]\nCampo: {}\nValor anterior: {}\nValor nuevo: {}\nExplicación: la persona lo corrigió\n[/ACTUALIZAR_CAMPO]",
        field, old, new
    )
}

#[tokio::test]
async fn test_full_profile_interview() {
    let mut h = harness(Script::financial_profile(), ConversationOptions::default());
    let mut events = h.conversation.subscribe();

    let greeting = h.conversation.start().await.unwrap();
    assert!(greeting.contains("nombre completo"));

    let answers = [
        "ana maría gómez",
        "tengo 34 años",
        "Casada",
        "dos hijos",
        "ingeniera   de sistemas",
        "22",
    ];
    let mut last = None;
    for (idx, answer) in answers.iter().enumerate() {
        let outcome = h.conversation.handle_user_input(answer).await.unwrap();
        assert!(outcome.captured.is_some(), "answer {} not captured", idx + 1);
        assert!(outcome.persistence_error.is_none());
        last = Some(outcome);
    }

    let last = last.unwrap();
    assert_eq!(last.progress, Progress { current: 6, completed: true });
    assert!(last.reply.starts_with("¡Listo!"));

    let profile = h.conversation.profile();
    assert_eq!(
        profile.get(FieldName::FullName),
        Some(&FieldValue::Name("Ana María Gómez".to_string()))
    );
    assert_eq!(profile.get(FieldName::Age), Some(&FieldValue::Age(34)));
    assert_eq!(
        profile.get(FieldName::MaritalStatus),
        Some(&FieldValue::MaritalStatus(MaritalStatus::Married))
    );
    assert_eq!(profile.get(FieldName::Dependents), Some(&FieldValue::Dependents(2)));
    assert_eq!(
        profile.get(FieldName::Occupation),
        Some(&FieldValue::Text("ingeniera de sistemas".to_string()))
    );
    assert_eq!(
        profile.get(FieldName::MonthlyIncome),
        Some(&FieldValue::Currency(22_000_000))
    );

    let stored = h.store.get("local").unwrap();
    assert_eq!(stored.fields.len(), 6);
    assert_eq!(h.store.upsert_count(), 6);

    // Transcript alternates and holds every turn
    let turns = h.conversation.transcript().turns();
    assert_eq!(turns.len(), 13);
    assert_eq!(turns[0].speaker, Speaker::Assistant);
    assert_eq!(turns[1].speaker, Speaker::User);

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        if event == ConversationEvent::Completed {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_unparsable_answer_still_advances() {
    let mut h = harness(Script::financial_profile(), ConversationOptions::default());
    let mut events = h.conversation.subscribe();
    h.conversation.start().await.unwrap();

    h.conversation.handle_user_input("Luis").await.unwrap();
    let outcome = h.conversation.handle_user_input("prefiero no decirlo").await.unwrap();

    assert!(outcome.captured.is_none());
    assert_eq!(outcome.parse_missed, Some(FieldName::Age));
    assert_eq!(outcome.progress.current, 3);
    assert!(h.conversation.profile().get(FieldName::Age).is_none());
    assert!(outcome.reply.contains("estado civil"));

    let mut missed = false;
    while let Ok(event) = events.try_recv() {
        missed |= event == ConversationEvent::ParseMissed { field: FieldName::Age };
    }
    assert!(missed);
}

#[tokio::test]
async fn test_answers_dispatch_to_the_question_they_answer() {
    let mut h = harness(Script::budget(), ConversationOptions::default());
    h.conversation.start().await.unwrap();

    let first = h.conversation.handle_user_input("4 millones").await.unwrap();
    assert_eq!(first.captured.unwrap().field, FieldName::MonthlyIncome);

    let second = h.conversation.handle_user_input("1.200.000").await.unwrap();
    let captured = second.captured.unwrap();
    assert_eq!(captured.field, FieldName::HousingExpense);
    assert_eq!(captured.value, FieldValue::Currency(1_200_000));
    assert_eq!(second.progress.current, 3);
}

#[tokio::test]
async fn test_ai_correction_is_applied_and_hidden() {
    let mut h = harness(Script::financial_profile(), ConversationOptions::default());
    let mut events = h.conversation.subscribe();
    h.conversation.start().await.unwrap();
    h.conversation.handle_user_input("Ana Gómez").await.unwrap();
    h.conversation.handle_user_input("34").await.unwrap();

    h.generator.push_reply(correction("edad", "34", "35 años"));
    let outcome = h
        .conversation
        .handle_user_input("perdón, tengo 35, y soy soltera")
        .await
        .unwrap();

    assert!(outcome.update.is_applied());
    assert_eq!(outcome.reply, "Claro, lo corrijo.");
    assert_eq!(h.conversation.profile().get(FieldName::Age), Some(&FieldValue::Age(35)));
    assert_eq!(
        h.store.get("local").unwrap().fields.get(&FieldName::Age),
        Some(&FieldValue::Age(35))
    );

    let last = h.conversation.transcript().last().unwrap();
    assert_eq!(last.text, "Claro, lo corrijo.");
    assert!(!last.text.contains("ACTUALIZAR"));

    let mut updated = None;
    while let Ok(event) = events.try_recv() {
        if let ConversationEvent::FieldUpdated { field, previous, value } = event {
            updated = Some((field, previous, value));
        }
    }
    assert_eq!(
        updated,
        Some((FieldName::Age, Some(FieldValue::Age(34)), FieldValue::Age(35)))
    );
}

#[tokio::test]
async fn test_rejected_correction_is_reported_to_the_ai() {
    let mut h = harness(Script::financial_profile(), ConversationOptions::default());
    h.conversation.start().await.unwrap();

    h.generator.push_reply(correction("mascota", "gato", "perro"));
    let outcome = h.conversation.handle_user_input("Ana").await.unwrap();
    assert_eq!(
        outcome.update,
        UpdateOutcome::InvalidField {
            field: "mascota".to_string()
        }
    );
    assert!(h.conversation.profile().get(FieldName::FullName).is_some());

    h.generator.push_reply(correction("age", "30", "muchos"));
    let outcome = h.conversation.handle_user_input("30").await.unwrap();
    assert!(matches!(
        outcome.update,
        UpdateOutcome::UnparsableValue { field: FieldName::Age, .. }
    ));
    // The answer itself still counts
    assert_eq!(h.conversation.profile().get(FieldName::Age), Some(&FieldValue::Age(30)));

    let prompts = h.generator.prompts();
    let last_prompt = prompts.last().unwrap();
    assert!(last_prompt.contains("Corrección rechazada"));
    assert!(last_prompt.contains("mascota"));

    // Told only once
    h.conversation.handle_user_input("soltero").await.unwrap();
    let prompts = h.generator.prompts();
    assert!(prompts.last().unwrap().contains("muchos"));
    assert!(!prompts.last().unwrap().contains("mascota"));
}

#[tokio::test]
async fn test_corrections_can_be_disabled() {
    let options = ConversationOptions {
        apply_ai_updates: false,
        ..Default::default()
    };
    let mut h = harness(Script::financial_profile(), options);
    h.conversation.start().await.unwrap();
    h.conversation.handle_user_input("Ana").await.unwrap();

    h.generator.push_reply(correction("age", "34", "40"));
    let outcome = h.conversation.handle_user_input("34").await.unwrap();

    assert_eq!(outcome.update, UpdateOutcome::NoUpdate);
    assert_eq!(h.conversation.profile().get(FieldName::Age), Some(&FieldValue::Age(34)));
    assert_eq!(outcome.reply, "Claro, lo corrijo.");
}

#[tokio::test]
async fn test_reply_with_only_a_block_gets_an_acknowledgement() {
    let mut h = harness(Script::budget(), ConversationOptions::default());
    h.conversation.start().await.unwrap();

    h.generator.push_reply(
        "[ACTUALIZAR_CAMPO]\nCampo: ingreso mensual\nValor anterior: 3 millones\nValor nuevo: 3,5 millones\nExplicación: subió el salario",
    );
    let outcome = h.conversation.handle_user_input("3 millones").await.unwrap();
    assert!(outcome.update.is_applied());
    assert_eq!(
        h.conversation.profile().get(FieldName::MonthlyIncome),
        Some(&FieldValue::Currency(3_500_000))
    );
    assert!(!outcome.reply.is_empty());
    assert!(!outcome.reply.contains("Campo"));
}

#[tokio::test]
async fn test_persistence_failure_is_not_fatal() {
    let mut h = harness(Script::budget(), ConversationOptions::default());
    h.conversation.start().await.unwrap();
    h.store.set_unavailable(true);

    let outcome = h.conversation.handle_user_input("800 mil").await.unwrap();
    assert!(outcome.persistence_error.is_some());
    assert!(outcome.captured.is_some());
    assert_eq!(
        h.conversation.profile().get(FieldName::MonthlyIncome),
        Some(&FieldValue::Currency(800_000))
    );
    assert!(h.store.get("local").is_none());

    h.store.set_unavailable(false);
    let outcome = h.conversation.handle_user_input("1 millón").await.unwrap();
    assert!(outcome.persistence_error.is_none());
    assert_eq!(h.store.upsert_count(), 1);
}

#[tokio::test]
async fn test_turns_after_completion_are_not_dispatched() {
    let mut h = harness(Script::budget(), ConversationOptions::default());
    h.conversation.start().await.unwrap();
    for answer in ["4 millones", "1 millón", "800 mil", "200 mil", "300 mil", "500 mil"] {
        h.conversation.handle_user_input(answer).await.unwrap();
    }
    assert!(h.conversation.is_complete());

    let outcome = h.conversation.handle_user_input("¿y ahora qué hago?").await.unwrap();
    assert!(outcome.captured.is_none());
    assert!(outcome.parse_missed.is_none());
    assert!(outcome.progress.completed);
    assert_eq!(h.conversation.profile().total_expenses(), 2_300_000);
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let mut h = harness(Script::budget(), ConversationOptions::default());
    h.conversation.start().await.unwrap();

    h.generator.push_reply("   ");
    let err = h.conversation.handle_user_input("4 millones").await.unwrap_err();
    assert!(matches!(err, AgentError::Generation(_)));

    // The answer was recorded before generation failed
    assert_eq!(h.conversation.transcript().user_turn_count(), 1);
    assert!(h.conversation.profile().get(FieldName::MonthlyIncome).is_some());

    h.generator.push_failure("modelo no disponible");
    let err = h.conversation.handle_user_input("1 millón").await.unwrap_err();
    assert!(matches!(err, AgentError::Generation(ref m) if m.contains("modelo no disponible")));
}

#[tokio::test]
async fn test_custom_user_id_is_used_for_persistence() {
    let options = ConversationOptions {
        user_id: "ana-42".to_string(),
        ..Default::default()
    };
    let mut h = harness(Script::budget(), options);
    h.conversation.start().await.unwrap();
    h.conversation.handle_user_input("5 millones").await.unwrap();

    assert!(h.store.get("ana-42").is_some());
    assert!(h.store.get("local").is_none());
}
