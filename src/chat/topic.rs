//! Topic filter
//!
//! Keyword checks that keep the assistant on diabetes. Questions are
//! screened before the model is called and answers are screened after.
//! Single-word keywords match whole words; phrases match as substrings.
//! Spanish and English vocabularies are both recognised.

/// Fixed answer for anything outside the assistant's scope
pub const REFUSAL: &str = "Sorry, I can only help with type 1 diabetes topics. \
     What can I help you with about your diabetes today?";

const DIABETES_TERMS: &[&str] = &[
    // condition
    "diabetes", "diabético", "diabética", "diabéticos", "diabéticas", "diabetic", "prediabetes",
    "hiperglucemia", "hipoglucemia", "hiperglucemias", "hipoglucemias", "hyperglycemia",
    "hypoglycemia", "hypo", "hyper", "hipo", "hiper", "cetoacidosis", "ketoacidosis",
    "gestacional", "gestational", "autoinmune", "autoimmune", "t1d", "t2d",
    "tipo 1", "tipo 2", "type 1", "type 2",
    // substances and measurements
    "glucosa", "glucose", "azúcar", "azucar", "sugar", "insulina", "insulin", "carbohidrato",
    "carbohidratos", "carbohydrate", "carbohydrates", "carb", "carbs", "cetona", "cetonas",
    "ketone", "ketones", "hba1c", "a1c", "hemoglobina", "glucagón", "glucagon", "glucógeno",
    "glycogen", "gmi",
    // devices
    "glucómetro", "glucometro", "glucómetros", "glucometer", "sensor", "sensores", "cgm",
    "bomba de insulina", "insulin pump", "monitoreo", "monitoring",
    // care
    "páncreas", "pancreas", "endocrinólogo", "endocrinóloga", "endocrino",
    "endocrinologist", "bolo", "bolus", "basal", "dosis", "dose", "inyección",
    "inyecciones", "injection", "tratamiento", "treatment",
    // symptoms
    "polidipsia", "polifagia", "poliuria", "síntoma", "síntomas", "sintomas", "symptom",
    "symptoms", "visión borrosa", "blurred vision", "mucha sed", "pérdida de peso",
    "weight loss",
];

const FOOD_TERMS: &[&str] = &[
    "desayuno", "almuerzo", "cena", "merienda", "comida", "comidas", "alimento", "alimentos",
    "comer", "menú", "menu", "receta", "recetas", "dieta", "snack", "breakfast", "lunch",
    "dinner", "meal", "meals", "food", "foods", "eat", "eating", "recipe", "diet",
    "ejercicio", "exercise",
];

const HELP_TERMS: &[&str] = &[
    "ayuda", "ayudar", "ayúdame", "recomendar", "recomiendas", "sugerir", "sugieres", "help",
    "recommend", "suggest", "should",
];

const GREETINGS: &[&str] = &[
    "hola", "buenos días", "buenas tardes", "buenas noches", "gracias", "hello", "hi",
    "hey", "good morning", "good afternoon", "thanks", "thank you",
];

const FORBIDDEN_QUESTION_TOPICS: &[&str] = &[
    "python", "java", "javascript", "código fuente", "source code", "programar un",
    "write a program", "función lambda", "lambda function", "ecuación diferencial",
    "differential equation", "integral definida", "derivada parcial", "teorema de",
    "champions league", "copa mundial", "world cup", "partido de fútbol", "football match",
    "película de marvel", "marvel movie", "serie de netflix", "netflix series",
    "elecciones presidenciales", "presidential election", "partido político",
    "political party", "segunda guerra mundial", "world war", "revolución francesa",
    "french revolution", "imperio romano", "roman empire",
];

const FORBIDDEN_ANSWER_TOPICS: &[&str] = &[
    "python", "programación", "programming", "código", "fútbol", "football", "soccer",
    "película", "movie", "música", "music", "política", "politics", "geografía", "geography",
];

/// Keyword screen for questions and answers
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicFilter;

struct Normalized {
    text: String,
    words: Vec<String>,
}

impl Normalized {
    fn new(input: &str) -> Self {
        let text = input.to_lowercase();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, words }
    }

    fn has(&self, term: &str) -> bool {
        if term.contains(' ') {
            self.text.contains(term)
        } else {
            self.words.iter().any(|w| w == term)
        }
    }

    fn has_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.has(t))
    }
}

impl TopicFilter {
    /// Whether a user question should reach the model
    pub fn is_on_topic(&self, question: &str) -> bool {
        let q = Normalized::new(question);

        if q.has_any(FORBIDDEN_QUESTION_TOPICS) {
            return false;
        }
        if q.has_any(DIABETES_TERMS) {
            return true;
        }
        if q.has_any(FOOD_TERMS) && q.has_any(HELP_TERMS) {
            return true;
        }
        q.has_any(GREETINGS)
    }

    /// Whether a model answer drifted off topic
    pub fn is_off_topic_answer(&self, answer: &str) -> bool {
        if answer.contains(REFUSAL) {
            return false;
        }
        Normalized::new(answer).has_any(FORBIDDEN_ANSWER_TOPICS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_topic() {
        let f = TopicFilter;
        assert!(f.is_on_topic("¿Cómo ajusto mi insulina basal?"));
        assert!(f.is_on_topic("What is a normal glucose level after lunch?"));
        assert!(f.is_on_topic("Tengo hipoglucemia por la noche"));
        assert!(f.is_on_topic("Can you recommend a breakfast?"));
        assert!(f.is_on_topic("Hola"));
        assert!(f.is_on_topic("Type 1 and exercise"));
    }

    #[test]
    fn test_off_topic() {
        let f = TopicFilter;
        assert!(!f.is_on_topic("Write a program in python"));
        assert!(!f.is_on_topic("Who won the world cup?"));
        assert!(!f.is_on_topic("What is the capital of France?"));
        // Diabetes words do not rescue a forbidden topic
        assert!(!f.is_on_topic("python script to log my glucose"));
        // Food alone is not enough
        assert!(!f.is_on_topic("best pizza in town, food critics"));
    }

    #[test]
    fn test_whole_word_matching() {
        let f = TopicFilter;
        // "hi" inside "this" and "carb" inside "carbon" do not count
        assert!(!f.is_on_topic("this carbon tax"));
    }

    #[test]
    fn test_answer_screen() {
        let f = TopicFilter;
        assert!(f.is_off_topic_answer("Here is some Python code for you"));
        assert!(!f.is_off_topic_answer("Check your glucose before exercise."));
        assert!(!f.is_off_topic_answer(REFUSAL));
    }
}
